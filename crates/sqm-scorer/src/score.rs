//! Dead-stream predicate and weighted quality score.

use crate::types::{ChannelPreference, DeadThresholds, ScoringWeights};
use sqm_common::model::{PriorityMode, StreamStats};

/// True when a probe captured resolution and fps but no bitrate — the
/// "functional but missing metadata" case that gets the flat `0.40`
/// fallback score instead of being treated as unplayable.
fn is_partial_probe(w: u32, h: u32, fps: f64, bitrate: f64) -> bool {
    w > 0 && h > 0 && fps > 0.0 && bitrate <= 0.0
}

/// "Unplayable" half of the dead predicate: conditions that don't depend
/// on the computed score. These always apply even when the dead-stream
/// feature is disabled (only the width/height-minima check is gated).
/// A partial probe (resolution + fps captured, bitrate missing) is exempt
/// from the bitrate/minima checks here — it is scored via the `0.40`
/// fallback instead and only dies later to the `min_score` floor.
fn is_unplayable(stats: &StreamStats, thresholds: &DeadThresholds) -> bool {
    let (w, h) = stats.resolution_wh().unwrap_or((0, 0));
    if w == 0 || h == 0 {
        return true;
    }

    let bitrate = stats.ffmpeg_output_bitrate_kbps.unwrap_or(0.0);
    let fps = stats.source_fps.unwrap_or(0.0);

    if bitrate <= 0.0 {
        return !is_partial_probe(w, h, fps, bitrate);
    }

    if thresholds.enabled {
        if bitrate < thresholds.min_bitrate_kbps {
            return true;
        }
        if w < thresholds.min_resolution_width || h < thresholds.min_resolution_height {
            return true;
        }
    }

    false
}

/// Full dead predicate, incorporating the post-scoring `min_score` floor.
/// `is_unplayable(s) ⇒ is_dead(s)` always; when the dead-stream feature is
/// disabled the `min_score` half is skipped.
pub fn is_dead(stats: &StreamStats, thresholds: &DeadThresholds, score: f64) -> bool {
    if is_unplayable(stats, thresholds) {
        return true;
    }
    thresholds.enabled && score < thresholds.min_score
}

fn resolution_term(height: u32) -> f64 {
    if height >= 1080 {
        1.0
    } else if height >= 720 {
        0.7
    } else if height >= 576 {
        0.5
    } else {
        0.3
    }
}

fn codec_term(codec: Option<&str>, prefer_h265: bool) -> f64 {
    let codec = match codec {
        Some(c) if !c.is_empty() && c != "N/A" => c.to_lowercase(),
        _ => return 0.0,
    };

    let is_hevc = codec == "hevc" || codec == "h265";
    let is_h264 = codec == "h264" || codec == "avc";

    match (is_hevc, is_h264, prefer_h265) {
        (true, _, true) => 1.0,
        (_, true, false) => 1.0,
        (true, _, false) => 0.8,
        (_, true, true) => 0.8,
        _ => 0.5,
    }
}

fn priority_bonus(priority: i64, priority_mode: PriorityMode) -> f64 {
    match priority_mode {
        PriorityMode::AllStreams => priority as f64 * 0.5,
        PriorityMode::SameResolution => priority as f64 * 0.2,
        PriorityMode::Disabled => 0.0,
    }
}

fn preference_bonus(height: u32, preference: &ChannelPreference) -> f64 {
    let mut bonus = 0.0;
    if preference.prefer_4k && height >= 2160 {
        bonus += 0.5;
    }
    if preference.avoid_4k && height >= 2160 {
        bonus -= 0.5;
    }
    if preference.max_1080p && height > 1080 {
        bonus -= 10.0;
    }
    if preference.max_720p && height > 720 {
        bonus -= 10.0;
    }
    bonus
}

/// Weighted quality score in roughly `[0, ~101]`. Dead streams always
/// score `0`; a partial probe (resolution and fps captured but no
/// bitrate) scores a flat `0.40` ahead of any bonuses.
#[allow(clippy::too_many_arguments)]
pub fn score(
    stats: &StreamStats,
    thresholds: &DeadThresholds,
    weights: &ScoringWeights,
    prefer_h265: bool,
    priority: i64,
    priority_mode: PriorityMode,
    preference: &ChannelPreference,
) -> f64 {
    if is_unplayable(stats, thresholds) {
        return 0.0;
    }

    let (_, height) = stats.resolution_wh().unwrap_or((0, 0));
    let bitrate = stats.ffmpeg_output_bitrate_kbps.unwrap_or(0.0);
    let fps = stats.source_fps.unwrap_or(0.0);

    if bitrate == 0.0 && fps > 0.0 {
        return 0.40;
    }

    let bitrate_term = (bitrate / 8000.0).min(1.0);
    let base = weights.bitrate * bitrate_term
        + weights.resolution * resolution_term(height)
        + weights.fps * (fps / 60.0).min(1.0)
        + weights.codec * codec_term(stats.video_codec.as_deref(), prefer_h265);

    base + priority_bonus(priority, priority_mode) + preference_bonus(height, preference)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(resolution: &str, fps: f64, codec: &str, bitrate_kbps: f64) -> StreamStats {
        StreamStats {
            resolution: Some(resolution.to_string()),
            source_fps: Some(fps),
            video_codec: Some(codec.to_string()),
            audio_codec: None,
            ffmpeg_output_bitrate_kbps: Some(bitrate_kbps),
        }
    }

    #[test]
    fn scenario_s1_basic_reorder_with_priority() {
        let weights = ScoringWeights::default();
        let thresholds = DeadThresholds::default();
        let preference = ChannelPreference::default();

        let s1 = stats("1920x1080", 30.0, "h264", 6000.0);
        let s2 = stats("1280x720", 30.0, "h264", 4000.0);
        let s3 = stats("1920x1080", 30.0, "hevc", 5500.0);

        let score_s1 = score(&s1, &thresholds, &weights, true, 4, PriorityMode::AllStreams, &preference);
        let score_s2 = score(&s2, &thresholds, &weights, true, 4, PriorityMode::AllStreams, &preference);
        let score_s3 = score(&s3, &thresholds, &weights, true, 4, PriorityMode::AllStreams, &preference);

        assert!((score_s1 - 2.805).abs() < 1e-9);
        assert!((score_s2 - 2.600).abs() < 1e-9);
        assert!((score_s3 - 2.800).abs() < 1e-9);

        let mut ordered = vec![("S1", score_s1), ("S2", score_s2), ("S3", score_s3)];
        ordered.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        let order: Vec<&str> = ordered.iter().map(|(name, _)| *name).collect();
        assert_eq!(order, vec!["S1", "S3", "S2"]);
    }

    #[test]
    fn scenario_s2_zero_resolution_is_dead() {
        let thresholds = DeadThresholds::default();
        let stats = StreamStats {
            resolution: Some("0x0".to_string()),
            source_fps: None,
            video_codec: None,
            audio_codec: None,
            ffmpeg_output_bitrate_kbps: None,
        };
        assert!(is_dead(&stats, &thresholds, 0.0));
        assert_eq!(
            score(
                &stats,
                &thresholds,
                &ScoringWeights::default(),
                true,
                0,
                PriorityMode::Disabled,
                &ChannelPreference::default()
            ),
            0.0
        );
    }

    #[test]
    fn partial_probe_without_bitrate_scores_flat_fallback() {
        let thresholds = DeadThresholds::default();
        let stats = StreamStats {
            resolution: Some("1920x1080".to_string()),
            source_fps: Some(30.0),
            video_codec: Some("h264".to_string()),
            audio_codec: None,
            ffmpeg_output_bitrate_kbps: None,
        };
        let result = score(
            &stats,
            &thresholds,
            &ScoringWeights::default(),
            true,
            0,
            PriorityMode::Disabled,
            &ChannelPreference::default(),
        );
        assert_eq!(result, 0.40);
    }

    #[test]
    fn partial_probe_is_not_unplayable_and_only_dies_to_min_score_floor() {
        let stats = StreamStats {
            resolution: Some("1920x1080".to_string()),
            source_fps: Some(30.0),
            video_codec: Some("h264".to_string()),
            audio_codec: None,
            ffmpeg_output_bitrate_kbps: None,
        };
        let below_fallback = DeadThresholds { enabled: true, min_score: 0.30, ..DeadThresholds::default() };
        assert!(!is_dead(&stats, &below_fallback, 0.40));

        let above_fallback = DeadThresholds { enabled: true, min_score: 0.50, ..DeadThresholds::default() };
        assert!(is_dead(&stats, &above_fallback, 0.40));
    }

    #[test]
    fn disabling_dead_stream_feature_skips_min_score_check_only() {
        let mut thresholds = DeadThresholds {
            enabled: false,
            min_bitrate_kbps: 5000.0,
            min_score: 99.0,
            ..DeadThresholds::default()
        };
        let stats = stats("1280x720", 25.0, "h264", 100.0);
        // min_bitrate_kbps/min_score are both ignored while disabled; only
        // the always-dead checks (0x0 resolution, bitrate <= 0) remain.
        assert!(!is_dead(&stats, &thresholds, 1.0));

        thresholds.enabled = true;
        assert!(is_dead(&stats, &thresholds, 1.0));
    }

    #[test]
    fn max_1080p_preference_excludes_higher_resolutions() {
        let thresholds = DeadThresholds::default();
        let preference = ChannelPreference {
            max_1080p: true,
            ..ChannelPreference::default()
        };
        let stats = stats("3840x2160", 30.0, "hevc", 8000.0);
        let result = score(
            &stats,
            &thresholds,
            &ScoringWeights::default(),
            true,
            0,
            PriorityMode::Disabled,
            &preference,
        );
        assert!(result < 0.0);
    }
}
