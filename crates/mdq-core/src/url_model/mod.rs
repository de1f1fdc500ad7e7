//! URL validation for job submission.
//!
//! A URL is accepted when, after trimming, it parses as an absolute URL with
//! an `http` or `https` scheme and a non-empty host. Anything else is rejected
//! before a job is created.

/// Returns true if `s` is an acceptable download URL.
///
/// # Examples
///
/// - `is_valid_url("https://www.youtube.com/watch?v=abc")` → `true`
/// - `is_valid_url("  HTTP://example.com/v ")` → `true`
/// - `is_valid_url("ftp://example.com/file")` → `false`
pub fn is_valid_url(s: &str) -> bool {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return false;
    }
    match url::Url::parse(trimmed) {
        Ok(u) => {
            matches!(u.scheme(), "http" | "https")
                && u.host_str().map(|h| !h.is_empty()).unwrap_or(false)
        }
        Err(_) => false,
    }
}

/// Splits pasted text into candidate URLs: one per line, trimmed, blank lines dropped.
pub fn split_url_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Partitions candidates into (valid, invalid) preserving input order.
pub fn partition_urls<I, S>(candidates: I) -> (Vec<String>, Vec<String>)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut valid = Vec::new();
    let mut invalid = Vec::new();
    for c in candidates {
        let c: String = c.into();
        let c = c.trim().to_string();
        if is_valid_url(&c) {
            valid.push(c);
        } else {
            invalid.push(c);
        }
    }
    (valid, invalid)
}
