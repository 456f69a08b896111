//! Token estimation shared by every budget calculation

/// Estimate tokens as `ceil(chars / 4)`.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}
