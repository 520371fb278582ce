//! Stateful parser over an ffmpeg analysis run's stderr lines.

use crate::codec::{extract_codec_from_line, sanitize_codec_name};
use regex::Regex;
use std::sync::LazyLock;

static RESOLUTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{2,5}x\d{2,5}").unwrap());
static FPS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*fps").unwrap());
static STATISTICS_BYTES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Statistics:\s*(\d+)\s*bytes read").unwrap());
static PROGRESS_BITRATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"bitrate=\s*([\d.]+)\s*kbits/s").unwrap());
static BYTES_READ: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*bytes read").unwrap());

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedStats {
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub resolution: Option<String>,
    pub fps: Option<f64>,
    pub bitrate_kbps: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Input,
    Output,
}

/// Accumulates state while stepping through stderr lines one at a time.
///
/// Mirrors the Python original's single pass over ffmpeg's diagnostic
/// output: codec/resolution/fps are only trusted from lines inside an
/// `Input #` section, and bitrate is resolved by method priority only
/// after the whole run has been consumed.
pub struct StderrParser {
    section: Section,
    video_codec: Option<String>,
    audio_codec: Option<String>,
    resolution: Option<String>,
    fps: Option<f64>,
    statistics_bitrate: Option<f64>,
    progress_bitrate: Option<f64>,
    bytes_read_bitrate: Option<f64>,
    duration_s: f64,
}

impl StderrParser {
    pub fn new(duration_s: f64) -> Self {
        Self {
            section: Section::None,
            video_codec: None,
            audio_codec: None,
            resolution: None,
            fps: None,
            statistics_bitrate: None,
            progress_bitrate: None,
            bytes_read_bitrate: None,
            duration_s,
        }
    }

    pub fn feed_line(&mut self, line: &str) {
        if line.starts_with("Input #") {
            self.section = Section::Input;
            return;
        }
        if line.starts_with("Output #") {
            self.section = Section::Output;
            return;
        }

        if self.section == Section::Input && line.trim_start().starts_with("Stream #") {
            if line.contains("Video:") {
                if self.video_codec.is_none() {
                    self.video_codec = extract_codec_from_line(line, "Video").map(|c| sanitize_codec_name(&c));
                }
                if self.resolution.is_none() {
                    self.resolution = RESOLUTION.find(line).map(|m| m.as_str().to_string());
                }
                if self.fps.is_none() {
                    self.fps = FPS.captures(line).and_then(|c| c[1].parse::<f64>().ok());
                }
            } else if line.contains("Audio:") && self.audio_codec.is_none() {
                self.audio_codec = extract_codec_from_line(line, "Audio").map(|c| sanitize_codec_name(&c));
            }
        }

        if self.statistics_bitrate.is_none() {
            if let Some(caps) = STATISTICS_BYTES.captures(line) {
                if let Ok(bytes) = caps[1].parse::<f64>() {
                    if self.duration_s > 0.0 {
                        self.statistics_bitrate = Some((bytes * 8.0 / 1000.0) / self.duration_s);
                    }
                }
            }
        }

        if let Some(caps) = PROGRESS_BITRATE.captures(line) {
            if let Ok(kbps) = caps[1].parse::<f64>() {
                self.progress_bitrate = Some(kbps);
            }
        }

        if self.bytes_read_bitrate.is_none() && self.statistics_bitrate.is_none() {
            if let Some(caps) = BYTES_READ.captures(line) {
                if !STATISTICS_BYTES.is_match(line) {
                    if let Ok(bytes) = caps[1].parse::<f64>() {
                        if self.duration_s > 0.0 {
                            self.bytes_read_bitrate = Some((bytes * 8.0 / 1000.0) / self.duration_s);
                        }
                    }
                }
            }
        }
    }

    pub fn finish(self) -> ParsedStats {
        let bitrate_kbps = self
            .statistics_bitrate
            .or(self.progress_bitrate)
            .or(self.bytes_read_bitrate);

        ParsedStats {
            video_codec: self.video_codec,
            audio_codec: self.audio_codec,
            resolution: self.resolution,
            fps: self.fps,
            bitrate_kbps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(duration_s: f64, lines: &[&str]) -> ParsedStats {
        let mut parser = StderrParser::new(duration_s);
        for line in lines {
            parser.feed_line(line);
        }
        parser.finish()
    }

    #[test]
    fn ignores_output_section_stream_lines() {
        let stats = parse(
            10.0,
            &[
                "Input #0, mpegts, from 'http://x':",
                "  Stream #0:0: Video: h264, yuv420p, 1280x720, 30 fps",
                "Output #0, null, to 'pipe:':",
                "  Stream #0:0: Video: rawvideo, yuv420p, 9999x9999, 1 fps",
            ],
        );
        assert_eq!(stats.resolution.as_deref(), Some("1280x720"));
        assert_eq!(stats.fps, Some(30.0));
    }

    #[test]
    fn statistics_bitrate_takes_priority_over_progress_line() {
        let stats = parse(
            10.0,
            &[
                "Input #0, mpegts, from 'http://x':",
                "  Stream #0:0: Video: h264, yuv420p, 1280x720, 30 fps",
                "frame=100 fps=30 size=1000kB time=00:00:10 bitrate=820.0kbits/s",
                "Statistics: 1250000 bytes read, 12 seeks",
            ],
        );
        // (1250000 * 8 / 1000) / 10 = 1000.0
        assert_eq!(stats.bitrate_kbps, Some(1000.0));
    }

    #[test]
    fn progress_bitrate_used_when_no_statistics_line() {
        let stats = parse(
            10.0,
            &[
                "frame=100 fps=30 size=1000kB time=00:00:10 bitrate=500.0kbits/s",
                "frame=200 fps=30 size=2000kB time=00:00:20 bitrate=512.5kbits/s",
            ],
        );
        assert_eq!(stats.bitrate_kbps, Some(512.5));
    }

    #[test]
    fn wrapped_codec_is_unwrapped_and_normalized() {
        let stats = parse(
            10.0,
            &[
                "Input #0, mpegts, from 'http://x':",
                "  Stream #0:0: Video: wrapped_avframe (avc1 / 0x31637661), yuv420p, 1920x1080, 25 fps",
            ],
        );
        assert_eq!(stats.video_codec.as_deref(), Some("h264"));
    }
}
