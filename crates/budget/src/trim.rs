//! Oldest-first trimming under a token ceiling.
//!
//! Text is treated as a chronological log: the front is the oldest content
//! and is dropped first. Cuts prefer the coarsest boundary that fits:
//!
//! 1. paragraph (`\n\n`)
//! 2. sentence (`.`, `!`, `?` followed by whitespace)
//! 3. word (whitespace)
//! 4. UTF-8 character
//!
//! A pinned prefix (e.g. an outline header) is never removed.

use crate::token::{estimate_size, max_bytes_for};

/// Trim `text` so that its estimate is at most `max_tokens`.
///
/// Text already under budget is returned unchanged, which makes the function
/// idempotent. `pinned_prefix` is honored only when `text` starts with it;
/// when the prefix alone exceeds the ceiling, the prefix is returned whole.
pub fn trim_to_budget(text: &str, max_tokens: usize, pinned_prefix: Option<&str>) -> String {
    if estimate_size(text) <= max_tokens {
        return text.to_string();
    }

    let prefix = pinned_prefix
        .filter(|p| !p.is_empty() && text.starts_with(p))
        .unwrap_or("");
    let body = &text[prefix.len()..];
    let body_budget = max_tokens.saturating_sub(estimate_size(prefix));

    let tail = newest_tail(body, max_bytes_for(body_budget));
    tracing::debug!(
        original_tokens = estimate_size(text),
        kept_tokens = estimate_size(prefix) + estimate_size(tail),
        max_tokens,
        "trimmed text to budget"
    );

    let mut out = String::with_capacity(prefix.len() + tail.len());
    out.push_str(prefix);
    out.push_str(tail);
    out
}

/// The longest suffix of `body` that fits in `max_bytes`, cut at the
/// coarsest boundary available.
fn newest_tail(body: &str, max_bytes: usize) -> &str {
    if body.len() <= max_bytes {
        return body;
    }
    if max_bytes == 0 {
        return "";
    }

    if let Some(start) = first_fitting(body, max_bytes, paragraph_starts(body)) {
        return &body[start..];
    }

    // No paragraph boundary fits. Work inside the newest paragraph only.
    let last_para = body.rfind("\n\n").map(|i| i + 2).unwrap_or(0);
    let para = &body[last_para..];

    if let Some(start) = first_fitting(para, max_bytes, sentence_starts(para)) {
        return &para[start..];
    }
    if let Some(start) = first_fitting(para, max_bytes, word_starts(para)) {
        return &para[start..];
    }

    let mut start = para.len().saturating_sub(max_bytes);
    while !para.is_char_boundary(start) {
        start += 1;
    }
    &para[start..]
}

/// First boundary (ascending) whose suffix fits.
fn first_fitting(
    text: &str,
    max_bytes: usize,
    boundaries: impl Iterator<Item = usize>,
) -> Option<usize> {
    boundaries
        .into_iter()
        .find(|&start| text.len() - start <= max_bytes)
}

fn paragraph_starts(text: &str) -> impl Iterator<Item = usize> + '_ {
    text.match_indices("\n\n").map(|(i, _)| i + 2)
}

fn sentence_starts(text: &str) -> impl Iterator<Item = usize> + '_ {
    let bytes = text.as_bytes();
    text.char_indices().filter_map(move |(i, c)| {
        if !matches!(c, '.' | '!' | '?') {
            return None;
        }
        let mut j = i + 1;
        if j >= bytes.len() || !bytes[j].is_ascii_whitespace() {
            return None;
        }
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        Some(j)
    })
}

fn word_starts(text: &str) -> impl Iterator<Item = usize> + '_ {
    let bytes = text.as_bytes();
    (1..bytes.len()).filter(move |&i| bytes[i - 1].is_ascii_whitespace() && !bytes[i].is_ascii_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraphs(n: usize) -> String {
        (1..=n)
            .map(|i| format!("Paragraph {i} discusses margins and free cash flow."))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    #[test]
    fn under_budget_is_unchanged() {
        let text = paragraphs(3);
        assert_eq!(trim_to_budget(&text, 10_000, None), text);
    }

    #[test]
    fn trimming_is_idempotent() {
        let text = paragraphs(20);
        let once = trim_to_budget(&text, 60, None);
        let twice = trim_to_budget(&once, 60, None);
        assert_eq!(once, twice);
        assert!(estimate_size(&once) <= 60);
    }

    #[test]
    fn drops_oldest_paragraphs_first() {
        let text = paragraphs(10);
        let trimmed = trim_to_budget(&text, 40, None);
        assert!(trimmed.ends_with("Paragraph 10 discusses margins and free cash flow."));
        assert!(!trimmed.contains("Paragraph 1 "));
        assert!(trimmed.starts_with("Paragraph "));
    }

    #[test]
    fn pinned_prefix_survives() {
        let header = "# Outline\n1. Overview\n2. Valuation\n\n";
        let text = format!("{header}{}", paragraphs(30));
        let trimmed = trim_to_budget(&text, 50, Some(header));
        assert!(trimmed.starts_with(header));
        assert!(estimate_size(&trimmed) <= 50);
        assert!(trimmed.contains("Paragraph 30"));
    }

    #[test]
    fn oversized_prefix_is_kept_whole() {
        let header = "H".repeat(400);
        let text = format!("{header}\n\nbody body body");
        let trimmed = trim_to_budget(&text, 10, Some(&header));
        assert_eq!(trimmed, header);
    }

    #[test]
    fn prefix_not_at_start_is_ignored() {
        let text = paragraphs(10);
        let trimmed = trim_to_budget(&text, 20, Some("# Outline"));
        assert!(estimate_size(&trimmed) <= 20);
    }

    #[test]
    fn falls_back_to_sentences() {
        let text = "First sentence is old. Second sentence is older than third. Third is newest.";
        let trimmed = trim_to_budget(text, 5, None);
        assert_eq!(trimmed, "Third is newest.");
    }

    #[test]
    fn falls_back_to_words() {
        let text = "alpha beta gamma delta epsilon zeta eta theta";
        let trimmed = trim_to_budget(text, 3, None);
        assert!(estimate_size(&trimmed) <= 3);
        assert!(trimmed.ends_with("theta"));
        assert!(!trimmed.starts_with(' '));
    }

    #[test]
    fn falls_back_to_char_boundary() {
        let text = "ééééééééééééééééééééé";
        let trimmed = trim_to_budget(text, 2, None);
        assert!(estimate_size(&trimmed) <= 2);
        assert!(trimmed.chars().all(|c| c == 'é'));
        assert!(!trimmed.is_empty());
    }

    #[test]
    fn zero_budget_yields_empty() {
        assert_eq!(trim_to_budget("some text", 0, None), "");
    }
}
