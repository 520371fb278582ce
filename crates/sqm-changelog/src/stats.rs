//! Display-string averages over a channel's non-dead analyzed streams.

use sqm_common::model::StreamStats;
use std::collections::HashMap;

/// Most common resolution string, arithmetic mean bitrate/fps (skipping
/// absent/zero values), each rendered as a display string or `"N/A"`.
pub fn compute_averages(streams: &[&StreamStats]) -> (String, String, String) {
    (average_resolution(streams), average_bitrate(streams), average_fps(streams))
}

fn average_resolution(streams: &[&StreamStats]) -> String {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for stats in streams {
        if let Some(res) = stats.resolution.as_deref() {
            if res != "0x0" {
                *counts.entry(res).or_insert(0) += 1;
            }
        }
    }
    counts
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map(|(res, _)| res.to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

fn average_bitrate(streams: &[&StreamStats]) -> String {
    let values: Vec<f64> = streams
        .iter()
        .filter_map(|s| s.ffmpeg_output_bitrate_kbps)
        .filter(|b| *b > 0.0)
        .collect();
    if values.is_empty() {
        return "N/A".to_string();
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    format!("{:.0} kbps", mean)
}

fn average_fps(streams: &[&StreamStats]) -> String {
    let values: Vec<f64> = streams
        .iter()
        .filter_map(|s| s.source_fps)
        .filter(|f| *f > 0.0)
        .collect();
    if values.is_empty() {
        return "N/A".to_string();
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    format!("{:.0} fps", mean)
}
