//! Chunk analyzer
//!
//! Finds perfect numbers and amicable pairs inside one chunk using the sum of
//! proper divisors, computed in O(√n) per number. The distribution layer only
//! sees the [`ChunkAnalyzer`] trait, so any pure, reentrant implementation can
//! be plugged in.
//!
//! Pair policy: a chunk reports the pair `(n, σ(n))` whenever `n` is inside
//! the chunk and `σ(σ(n)) == n`, no matter which chunk the partner falls in.
//! Every valid pair is therefore reported by at least one chunk, and pairs
//! that straddle a chunk boundary are reported twice and merged later.

use crate::partition::Range;
use crate::results::PartialResult;
use thiserror::Error;

/// Failure of the arithmetic behind an analysis
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalyzeError {
    #[error("divisor sum of {0} overflows u64")]
    Overflow(u64),
}

/// Pure function from a chunk to the findings inside it
///
/// Implementations must be deterministic and safe to call concurrently on
/// disjoint ranges.
pub trait ChunkAnalyzer: Send + Sync {
    fn analyze(&self, range: Range) -> Result<PartialResult, AnalyzeError>;
}

/// Analyzer backed by trial-division divisor sums
#[derive(Debug, Clone, Copy, Default)]
pub struct DivisorSumAnalyzer;

impl ChunkAnalyzer for DivisorSumAnalyzer {
    fn analyze(&self, range: Range) -> Result<PartialResult, AnalyzeError> {
        analyze(range)
    }
}

impl<F> ChunkAnalyzer for F
where
    F: Fn(Range) -> Result<PartialResult, AnalyzeError> + Send + Sync,
{
    fn analyze(&self, range: Range) -> Result<PartialResult, AnalyzeError> {
        self(range)
    }
}

/// Sum of the proper divisors of `n` (σ(n) - n)
///
/// σ(0) and σ(1) are defined as 0.
pub fn divisor_sum(n: u64) -> Result<u64, AnalyzeError> {
    if n <= 1 {
        return Ok(0);
    }

    let mut sum: u64 = 1;
    let mut i: u64 = 2;
    // i <= n / i avoids squaring past u64::MAX
    while i <= n / i {
        if n % i == 0 {
            let pair = n / i;
            sum = sum.checked_add(i).ok_or(AnalyzeError::Overflow(n))?;
            if pair != i {
                sum = sum.checked_add(pair).ok_or(AnalyzeError::Overflow(n))?;
            }
        }
        i += 1;
    }

    Ok(sum)
}

pub fn is_perfect(n: u64) -> Result<bool, AnalyzeError> {
    Ok(n > 0 && divisor_sum(n)? == n)
}

/// The amicable partner of `n`, if `n` belongs to an amicable pair
pub fn amicable_partner(n: u64) -> Result<Option<u64>, AnalyzeError> {
    let s = divisor_sum(n)?;
    if s == n || s == 0 {
        return Ok(None);
    }
    if divisor_sum(s)? == n {
        Ok(Some(s))
    } else {
        Ok(None)
    }
}

/// Perfect numbers and amicable pairs reachable from `range`
pub fn analyze(range: Range) -> Result<PartialResult, AnalyzeError> {
    let mut partial = PartialResult::new();

    for n in range.iter() {
        let s = divisor_sum(n)?;
        if s == n {
            partial.insert_perfect(n);
        } else if s > 1 && divisor_sum(s)? == n {
            partial.insert_pair(n, s);
        }
    }

    Ok(partial)
}

/// Properties of a single number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberReport {
    pub number: u64,
    pub divisor_sum: u64,
    pub perfect: bool,
    pub amicable_partner: Option<u64>,
}

pub fn inspect(n: u64) -> Result<NumberReport, AnalyzeError> {
    let divisor_sum = divisor_sum(n)?;
    Ok(NumberReport {
        number: n,
        divisor_sum,
        perfect: n > 0 && divisor_sum == n,
        amicable_partner: amicable_partner(n)?,
    })
}

/// Even perfect numbers up to `limit` via Euclid's formula
///
/// `2^(p-1) * (2^p - 1)` is perfect whenever `2^p - 1` is a Mersenne prime.
/// Stops once the next candidate would not fit in a u64.
pub fn euclid_perfect_numbers(limit: u64) -> Vec<u64> {
    let mut perfect = Vec::new();

    for p in 2u32..32 {
        let mersenne = (1u64 << p) - 1;
        if !is_prime(mersenne) {
            continue;
        }
        let candidate = match (1u64 << (p - 1)).checked_mul(mersenne) {
            Some(c) => c,
            None => break,
        };
        if candidate > limit {
            break;
        }
        perfect.push(candidate);
    }

    perfect
}

fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n < 4 {
        return true;
    }
    if n % 2 == 0 {
        return false;
    }
    let mut i = 3;
    while i <= n / i {
        if n % i == 0 {
            return false;
        }
        i += 2;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: u64, end: u64) -> Range {
        Range::new(start, end).unwrap()
    }

    #[test]
    fn test_divisor_sum_small_values() {
        assert_eq!(divisor_sum(0).unwrap(), 0);
        assert_eq!(divisor_sum(1).unwrap(), 0);
        assert_eq!(divisor_sum(2).unwrap(), 1);
        assert_eq!(divisor_sum(6).unwrap(), 6);
        assert_eq!(divisor_sum(9).unwrap(), 4);
        assert_eq!(divisor_sum(220).unwrap(), 284);
        assert_eq!(divisor_sum(284).unwrap(), 220);
    }

    #[test]
    fn test_analyze_up_to_28() {
        let partial = analyze(range(1, 28)).unwrap();
        let perfect: Vec<u64> = partial.perfect_numbers().iter().copied().collect();
        assert_eq!(perfect, vec![6, 28]);
        assert!(partial.amicable_pairs().is_empty());
    }

    #[test]
    fn test_analyze_reports_partner_outside_chunk() {
        let low = analyze(range(1, 150)).unwrap();
        assert!(low.amicable_pairs().is_empty());

        let mid = analyze(range(200, 250)).unwrap();
        assert!(mid.amicable_pairs().contains(&(220, 284)));

        let high = analyze(range(251, 300)).unwrap();
        assert!(high.amicable_pairs().contains(&(220, 284)));
    }

    #[test]
    fn test_analyze_up_to_10000() {
        let partial = analyze(range(1, 10_000)).unwrap();
        let perfect: Vec<u64> = partial.perfect_numbers().iter().copied().collect();
        assert_eq!(perfect, vec![6, 28, 496, 8128]);
        let pairs: Vec<(u64, u64)> = partial.amicable_pairs().iter().copied().collect();
        assert_eq!(pairs, vec![(220, 284), (1184, 1210), (2620, 2924), (5020, 5564), (6232, 6368)]);
    }

    #[test]
    fn test_inspect_known_numbers() {
        let six = inspect(6).unwrap();
        assert!(six.perfect);
        assert_eq!(six.amicable_partner, None);

        let a = inspect(220).unwrap();
        assert!(!a.perfect);
        assert_eq!(a.divisor_sum, 284);
        assert_eq!(a.amicable_partner, Some(284));

        assert_eq!(inspect(284).unwrap().amicable_partner, Some(220));
        assert!(inspect(496).unwrap().perfect);
        assert!(inspect(8128).unwrap().perfect);
        assert_eq!(inspect(1).unwrap().amicable_partner, None);
    }

    #[test]
    fn test_euclid_matches_brute_force() {
        assert_eq!(euclid_perfect_numbers(10_000), vec![6, 28, 496, 8128]);
        assert_eq!(euclid_perfect_numbers(5), Vec::<u64>::new());
        for n in euclid_perfect_numbers(40_000_000) {
            assert!(is_perfect(n).unwrap());
        }
    }

    #[test]
    fn test_closure_analyzer() {
        let fixed = |_range: Range| -> Result<PartialResult, AnalyzeError> {
            let mut partial = PartialResult::new();
            partial.insert_perfect(6);
            Ok(partial)
        };
        let partial = fixed.analyze(range(1, 2)).unwrap();
        assert!(partial.perfect_numbers().contains(&6));
        assert!(DivisorSumAnalyzer.analyze(range(1, 5)).unwrap().is_empty());
    }
}
