//! Token estimation.
//!
//! Character-based heuristic: one token per four UTF-8 bytes, rounded up.
//! Close enough for BPE tokenizers on English prose, and cheap enough to run
//! on every excerpt and rolling-context update.

/// Estimate the token count for a string. Empty text is zero tokens.
pub fn estimate_size(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.len().div_ceil(4)
}

/// Largest byte length whose estimate still fits in `tokens`.
pub(crate) fn max_bytes_for(tokens: usize) -> usize {
    tokens.saturating_mul(4)
}
