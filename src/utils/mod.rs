//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod error;
pub mod retry;

use regex::Regex;
use std::sync::OnceLock;

/// Collapse runs of whitespace (including non-breaking spaces) into one space
pub fn normalize_whitespace(text: &str) -> String {
    static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();

    let re = WHITESPACE_RE.get_or_init(|| Regex::new(r"[\s\u{00A0}]+").expect("Invalid regex pattern"));

    re.replace_all(text.trim_matches(|c: char| c.is_whitespace() || c == '\u{00A0}'), " ")
        .to_string()
}

/// Case-insensitive prefix check after whitespace normalization
pub fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    let text = normalize_whitespace(text).to_lowercase();
    let prefix = normalize_whitespace(prefix).to_lowercase();
    text.starts_with(&prefix)
}

/// Truncate text to at most `max_chars` characters for display
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let keep = max_chars.saturating_sub(3);
    let truncated: String = text.chars().take(keep).collect();
    format!("{truncated}...")
}
