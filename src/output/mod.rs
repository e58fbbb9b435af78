//! Result rendering
//!
//! - `text`: console tables and banners
//! - `json`: round history export

pub mod json;
pub mod text;
