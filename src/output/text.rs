//! Human-readable text output

use crate::analyzer::NumberReport;
use crate::harness::{BenchReport, RoundHistory, Strategy};
use crate::partition::Range;
use crate::results::AggregateResult;
use crate::util::time::{calculate_rate, format_duration, format_rate};

const RULE: &str = "═══════════════════════════════════════════════════════════";

/// Longest list printed without `--verbose`
const LIST_LIMIT: usize = 8;
const VERBOSE_HINT: &str = "  (use --verbose to list them)";

/// Print the findings of one round
///
/// Counts are always shown; `verbose` lists every number and pair.
pub fn print_round(strategy: Strategy, range: Range, result: &AggregateResult, verbose: bool) {
    println!("{}", RULE);
    println!("          ROUND RESULTS: {} ({})", range, strategy);
    println!("{}", RULE);
    println!();

    println!("Workers:      {}", result.worker_count());
    println!("Elapsed Time: {}", format_duration(result.elapsed()));
    println!(
        "Rate:         {} numbers/s",
        format_rate(calculate_rate(range.len(), result.elapsed()))
    );
    println!();

    println!("Perfect numbers: {}", result.perfect_numbers().len());
    match listed(result.perfect_numbers(), verbose) {
        Some(numbers) => {
            for n in numbers {
                println!("  {}", n);
            }
        }
        None => println!("{}", VERBOSE_HINT),
    }

    println!("Amicable pairs:  {}", result.amicable_pairs().len());
    match listed(result.amicable_pairs(), verbose) {
        Some(pairs) => {
            for (a, b) in pairs {
                println!("  ({}, {})", a, b);
            }
        }
        None => println!("{}", VERBOSE_HINT),
    }
    println!();
}

/// Findings to list in full, or `None` when only the count is shown
fn listed<T>(items: &[T], verbose: bool) -> Option<&[T]> {
    (verbose || items.len() <= LIST_LIMIT).then_some(items)
}

/// Print every recorded round
pub fn print_history(history: &RoundHistory) {
    if history.is_empty() {
        return;
    }

    println!("Round history:");
    println!("  {:<12} {:>21} {:>8} {:>12}", "STRATEGY", "RANGE", "WORKERS", "ELAPSED");
    for record in history.records() {
        println!(
            "  {:<12} {:>21} {:>8} {:>12}",
            record.strategy.to_string(),
            record.range.to_string(),
            record.worker_count,
            format_duration(record.elapsed)
        );
    }
    println!();
}

/// Print the strategy comparison table
pub fn print_comparison(report: &BenchReport) {
    println!("{}", RULE);
    println!("                 STRATEGY COMPARISON");
    println!("{}", RULE);
    println!();
    println!(
        "  {:>21} {:<12} {:>8} {:>12} {:>8} {:>6} {:>6}",
        "RANGE", "STRATEGY", "WORKERS", "ELAPSED", "SPEEDUP", "PERF", "PAIRS"
    );

    for row in report.rows() {
        let speedup = match row.speedup {
            Some(s) => format!("{:.2}x", s),
            None => "-".to_string(),
        };
        println!(
            "  {:>21} {:<12} {:>8} {:>12} {:>8} {:>6} {:>6}",
            row.range.to_string(),
            row.strategy.to_string(),
            row.worker_count,
            format_duration(row.elapsed),
            speedup,
            row.perfect_numbers,
            row.amicable_pairs
        );
    }
    println!();
}

/// Print single-number reports
pub fn print_inspect(reports: &[NumberReport]) {
    for report in reports {
        let kind = if report.perfect {
            "perfect".to_string()
        } else if let Some(partner) = report.amicable_partner {
            format!("amicable with {}", partner)
        } else if report.divisor_sum > report.number {
            "abundant".to_string()
        } else {
            "deficient".to_string()
        };
        println!(
            "{:>12}: divisor sum {:>12}  {}",
            report.number, report.divisor_sum, kind
        );
    }
}

pub fn print_euclid(limit: u64, perfect: &[u64]) {
    println!("Even perfect numbers up to {} (Euclid-Euler):", limit);
    for n in perfect {
        println!("  {}", n);
    }
}
