//! Small text/url helpers shared across modules.

/// Trim a value and drop it entirely when blank.
#[must_use]
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Whether a value looks like an absolute http(s) URL.
#[must_use]
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Collapse a possibly multi-line payload into a single trimmed line.
#[must_use]
pub fn compact_text(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
