//! Codec token extraction and FourCC normalization from ffmpeg `Stream #`
//! lines.

use regex::Regex;
use std::sync::LazyLock;

static CODEC_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(Video|Audio):\s*([a-zA-Z0-9_-]+)").unwrap());
static HEX_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^0x").unwrap());
static VALID_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap());

const WRAPPER_CODECS: [&str; 4] = ["wrapped_avframe", "unknown", "none", "null"];
const INVALID_CODECS: [&str; 4] = ["wrapped_avframe", "none", "unknown", "null"];

const FOURCC_TO_CODEC: &[(&str, &str)] = &[
    ("avc1", "h264"),
    ("avc3", "h264"),
    ("h264", "h264"),
    ("hvc1", "hevc"),
    ("hev1", "hevc"),
    ("hevc", "hevc"),
    ("vp09", "vp9"),
    ("vp08", "vp8"),
    ("mp4a", "aac"),
];

/// Extract the codec token following `Video:`/`Audio:` on a `Stream #`
/// line, looking inside parentheses when the token is a generic wrapper
/// like `wrapped_avframe (avc1 / 0x31637661)`.
pub fn extract_codec_from_line(line: &str, codec_type: &str) -> Option<String> {
    let caps = CODEC_LINE.captures_iter(line).find(|c| &c[1] == codec_type)?;
    let codec = caps[2].to_string();

    if !WRAPPER_CODECS.contains(&codec.to_lowercase().as_str()) {
        return Some(codec);
    }

    let paren_pattern = format!(r"{}\s*\(([^)]+)\)", regex::escape(&codec));
    let re = Regex::new(&paren_pattern).ok()?;
    let paren_content = re.captures(line)?.get(1)?.as_str().trim().to_string();

    paren_content
        .split(|c: char| c == '/' || c == ',' || c.is_whitespace())
        .map(str::trim)
        .find(|token| !token.is_empty() && !HEX_TOKEN.is_match(token) && VALID_TOKEN.is_match(token))
        .map(str::to_string)
}

/// Filter placeholder codec names and normalize FourCC codes to their
/// common name (e.g. `avc1` -> `h264`).
pub fn sanitize_codec_name(codec: &str) -> String {
    if codec.is_empty() {
        return "N/A".to_string();
    }
    let lower = codec.to_lowercase();
    if INVALID_CODECS.contains(&lower.as_str()) {
        return "N/A".to_string();
    }
    FOURCC_TO_CODEC
        .iter()
        .find(|(fourcc, _)| *fourcc == lower)
        .map(|(_, normalized)| normalized.to_string())
        .unwrap_or_else(|| codec.to_string())
}
