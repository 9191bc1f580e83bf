//! Inline citation extraction.
//!
//! Producers ask the backend to cite every figure as
//! `[Source: document, date]`. The distinct sources become the artifact's
//! `data_sources`.

const MARKER: &str = "[Source:";

/// Distinct citations in first-seen order.
pub fn extract_citations(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find(MARKER) {
        let after = &rest[start + MARKER.len()..];
        let Some(end) = after.find(']') else {
            break;
        };
        let source = after[..end].trim();
        if !source.is_empty() && !found.iter().any(|s| s == source) {
            found.push(source.to_string());
        }
        rest = &after[end + 1..];
    }

    found
}
