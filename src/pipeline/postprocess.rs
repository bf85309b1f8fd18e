//! Optional cleanup of extraction records.
//!
//! Records are opaque text and are stored exactly as the model returned
//! them unless `strip_code_fences` is enabled. Vision models routinely wrap
//! JSON in a ```` ```json ```` fence even when told not to; with the option
//! on, that outer fence is removed so the stored record is bare JSON text.
//! The content between the fences is never touched.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\n(.*?)\n?```\s*$").unwrap());

/// Normalise one record: unify line endings and strip a wrapping fence.
pub fn clean_record(input: &str) -> String {
    let s = normalise_line_endings(input);
    strip_code_fences(&s)
}

/// Remove a single code fence that wraps the entire text.
pub fn strip_code_fences(input: &str) -> String {
    let trimmed = input.trim();
    match RE_OUTER_FENCES.captures(trimmed) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}
