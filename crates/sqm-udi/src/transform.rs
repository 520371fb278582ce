//! Profile URL transformation: `search_pattern`/`replace_pattern` applied
//! to a stream's base URL, with stream-protocol validation on the result.

use regex::Regex;

const ALLOWED_SCHEMES: [&str; 4] = ["http://", "https://", "rtmp://", "rtmps://"];

/// Rewrite `$N` backreferences (1..=99, high-to-low so `$12` isn't mangled
/// into `${1}2`) into `regex`'s `${N}` replacement syntax.
fn normalize_backreferences(replace_pattern: &str) -> String {
    let mut result = replace_pattern.to_string();
    for n in (1..=99).rev() {
        let from = format!("${n}");
        if result.contains(&from) {
            result = result.replace(&from, &format!("${{{n}}}"));
        }
    }
    result
}

/// Apply `search_pattern` → `replace_pattern` to `url`, rejecting the
/// result unless it keeps a recognized stream-protocol scheme. Empty or
/// whitespace-only patterns mean "no transformation"; a non-matching
/// pattern also means "no transformation".
pub fn apply_url_transformation(url: &str, search_pattern: &str, replace_pattern: &str) -> String {
    if search_pattern.trim().is_empty() || replace_pattern.trim().is_empty() {
        return url.to_string();
    }

    let re = match Regex::new(search_pattern) {
        Ok(re) => re,
        Err(_) => return url.to_string(),
    };

    if !re.is_match(url) {
        return url.to_string();
    }

    let normalized = normalize_backreferences(replace_pattern);
    let transformed = re.replace(url, normalized.as_str()).into_owned();

    if ALLOWED_SCHEMES.iter().any(|scheme| transformed.starts_with(scheme)) {
        transformed
    } else {
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pattern_is_identity() {
        assert_eq!(apply_url_transformation("http://a/b", "", "http://x"), "http://a/b");
    }

    #[test]
    fn simple_substitution_with_backreference() {
        let url = "http://host.example/live/user123/token456/stream.m3u8";
        let out = apply_url_transformation(
            url,
            r"http://host\.example/live/(\w+)/(\w+)/(.+)",
            "https://cdn.example/$1/$3",
        );
        assert_eq!(out, "https://cdn.example/user123/stream.m3u8");
    }

    #[test]
    fn non_matching_pattern_leaves_url_untouched() {
        let out = apply_url_transformation("http://a/b", r"^nomatch$", "http://x");
        assert_eq!(out, "http://a/b");
    }

    #[test]
    fn result_without_allowed_scheme_is_rejected() {
        let out = apply_url_transformation("http://a/b", r"http://a/(.+)", "ftp://a/$1");
        assert_eq!(out, "http://a/b");
    }

    #[test]
    fn multi_digit_backreference_is_not_mangled() {
        let url = "http://host/a-b-c-d-e-f-g-h-i-j-k-l";
        let re = r"http://host/([a-z])-([a-z])-([a-z])-([a-z])-([a-z])-([a-z])-([a-z])-([a-z])-([a-z])-([a-z])-([a-z])-([a-z])";
        let out = apply_url_transformation(url, re, "http://host/$12$11$10$1");
        assert_eq!(out, "http://host/lkja");
    }
}
