//! Pattern-text substitution rules and compilation.
//!
//! Small, self-contained `matches_*` predicates over a compiled regex plus
//! the channel-name/whitespace substitution rules applied before matching.

use regex::{Regex, RegexBuilder};

pub struct CompiledPattern {
    pub source: String,
    pub regex: Regex,
}

/// Substitute `CHANNEL_NAME` with the regex-escaped channel name, then
/// rewrite any run of literal ASCII spaces not preceded by `\` as `\s+`.
pub fn build_effective_pattern(raw: &str, channel_name: &str) -> String {
    let escaped_name = regex::escape(channel_name);
    let substituted = raw.replace("CHANNEL_NAME", &escaped_name);
    rewrite_spaces(&substituted)
}

fn rewrite_spaces(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_was_backslash = false;
    for c in s.chars() {
        if c == ' ' && !prev_was_backslash {
            out.push_str("\\s+");
        } else {
            out.push(c);
        }
        prev_was_backslash = c == '\\';
    }
    out
}

pub fn compile_pattern(
    raw: &str,
    channel_name: &str,
    case_insensitive: bool,
) -> std::result::Result<CompiledPattern, regex::Error> {
    let effective = build_effective_pattern(raw, channel_name);
    let regex = RegexBuilder::new(&effective)
        .case_insensitive(case_insensitive)
        .build()?;
    Ok(CompiledPattern {
        source: raw.to_string(),
        regex,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_name_is_escaped_and_substituted() {
        let pattern = build_effective_pattern(r"^CHANNEL_NAME HD$", "ESPN+");
        assert_eq!(pattern, r"^ESPN\+\s+HD$");
    }

    #[test]
    fn escaped_space_is_left_untouched() {
        let pattern = build_effective_pattern(r"a\ b c", "x");
        assert_eq!(pattern, r"a\ b\s+c");
    }

    #[test]
    fn compile_fails_on_invalid_regex() {
        assert!(compile_pattern("(unclosed", "x", false).is_err());
    }

    #[test]
    fn compile_applies_case_insensitivity() {
        let compiled = compile_pattern("^hbo$", "x", true).unwrap();
        assert!(compiled.regex.is_match("HBO"));
    }
}
