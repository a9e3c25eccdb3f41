//! Video metadata (`.info.json`) normalization.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::Normalized;
use crate::db::models::{is_storable, VideoMetadata};

/// The subset of a yt-dlp info document we keep. Older and newer yt-dlp
/// versions differ in which of these are present.
#[derive(Debug, Deserialize)]
struct RawVideoInfo {
    id: Option<String>,
    title: Option<String>,
    channel_id: Option<String>,
    channel: Option<String>,
    uploader: Option<String>,
    release_timestamp: Option<f64>,
    timestamp: Option<f64>,
    duration: Option<f64>,
    duration_string: Option<String>,
    was_live: Option<bool>,
    live_status: Option<String>,
}

/// Normalize one parsed info document.
pub fn normalize_metadata(doc: &Value, filename: &str) -> Normalized<VideoMetadata> {
    let raw: RawVideoInfo = match RawVideoInfo::deserialize(doc) {
        Ok(raw) => raw,
        Err(e) => return Normalized::malformed(format!("unexpected info document shape: {e}")),
    };

    let video_id = match raw.id.filter(|id| !id.is_empty()) {
        Some(id) => id,
        None => return Normalized::malformed("info document has no id"),
    };

    let duration = raw
        .duration
        .and_then(seconds_to_delta)
        .or_else(|| raw.duration_string.as_deref().and_then(parse_duration_string));

    let was_live = raw
        .was_live
        .or_else(|| raw.live_status.as_deref().map(|s| s == "was_live"));

    Normalized::Record(VideoMetadata {
        video_id,
        title: raw.title.unwrap_or_default(),
        channel_id: raw.channel_id.unwrap_or_default(),
        channel_name: raw.channel.or(raw.uploader).unwrap_or_default(),
        release_timestamp: raw.release_timestamp.and_then(epoch_seconds),
        timestamp: raw.timestamp.and_then(epoch_seconds),
        duration,
        was_live,
        filename: filename.to_string(),
    })
}

fn epoch_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis((secs * 1000.0).round() as i64).filter(is_storable)
}

fn seconds_to_delta(secs: f64) -> Option<TimeDelta> {
    if !secs.is_finite() {
        return None;
    }
    TimeDelta::try_milliseconds((secs * 1000.0).round() as i64)
}

/// Parse `HH:MM:SS`, `MM:SS` or `SS` as a duration.
pub fn parse_duration_string(s: &str) -> Option<TimeDelta> {
    let parts = s
        .trim()
        .split(':')
        .map(|p| p.trim().parse::<i64>().ok())
        .collect::<Option<Vec<_>>>()?;

    let seconds = match parts.as_slice() {
        [h, m, s] => h.checked_mul(3600)?.checked_add(m.checked_mul(60)?)?.checked_add(*s)?,
        [m, s] => m.checked_mul(60)?.checked_add(*s)?,
        [s] => *s,
        _ => return None,
    };
    TimeDelta::try_seconds(seconds)
}
