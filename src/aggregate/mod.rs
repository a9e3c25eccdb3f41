//! Time-windowed chat activity.
//!
//! Messages of one video are bucketed into fixed-width, half-open windows
//! `[start, start + W)` along one of two axes: stream offset (milliseconds)
//! or wall-clock time (microseconds since the epoch). All window arithmetic
//! is integer arithmetic in the axis unit.

mod emoji;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::db::models::from_sql_timestamp;
use crate::db::Database;
use crate::error::{Error, Result};
pub use emoji::custom_emojis;

/// Which time value positions a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowAxis {
    /// `video_offset_time_msec`, in milliseconds.
    Offset,
    /// `timestamp`, in microseconds since the Unix epoch.
    WallClock,
}

impl WindowAxis {
    /// Convert a span into this axis' integer unit.
    fn units(&self, span: TimeDelta) -> Option<i64> {
        match self {
            WindowAxis::Offset => Some(span.num_milliseconds()),
            WindowAxis::WallClock => span.num_microseconds(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WindowSpec {
    pub width: TimeDelta,
    pub axis: WindowAxis,
    /// Drop pre-stream chat (offset <= 0) and chat past the video's duration.
    pub stream_only: bool,
    /// Leave the video's overall most frequent emoji out of per-window picks.
    pub exclude_global_top_emoji: bool,
}

impl WindowSpec {
    pub fn minutes(minutes: i64) -> Self {
        Self {
            width: TimeDelta::minutes(minutes),
            axis: WindowAxis::Offset,
            stream_only: false,
            exclude_global_top_emoji: true,
        }
    }

    pub fn axis(mut self, axis: WindowAxis) -> Self {
        self.axis = axis;
        self
    }

    pub fn stream_only(mut self, stream_only: bool) -> Self {
        self.stream_only = stream_only;
        self
    }
}

impl Default for WindowSpec {
    fn default() -> Self {
        Self::minutes(5)
    }
}

/// One window of activity. `start`/`end` are in the axis unit; `end` is
/// exclusive and only the last window may be shorter than the width.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowStat {
    pub axis: WindowAxis,
    pub start: i64,
    pub end: i64,
    pub unique_authors: usize,
    pub message_count: usize,
    pub top_emoji: Option<String>,
}

impl WindowStat {
    /// Window start as wall-clock time (WallClock axis only).
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        match self.axis {
            WindowAxis::WallClock => DateTime::from_timestamp_micros(self.start),
            WindowAxis::Offset => None,
        }
    }

    /// Human label for the window start: `H:MM:SS` offset or RFC 3339 time.
    pub fn start_label(&self) -> String {
        match self.axis {
            WindowAxis::Offset => format_offset(self.start),
            WindowAxis::WallClock => self
                .start_time()
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
        }
    }
}

/// `-0:00:30`, `1:05:00` style label for a millisecond offset.
pub fn format_offset(ms: i64) -> String {
    let sign = if ms < 0 { "-" } else { "" };
    let secs = ms.unsigned_abs() / 1000;
    format!("{sign}{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// One message positioned on an axis.
#[derive(Debug, Clone)]
pub struct Sample {
    pub key: i64,
    pub author: String,
    pub message: String,
}

/// Most windows one call may produce.
pub const MAX_WINDOWS: usize = 100_000;

/// Bucket samples into contiguous windows of `width` axis units.
///
/// The first window starts at the earliest key floor-aligned to a multiple
/// of `width`; windows run through the latest key, and the last one ends at
/// `latest + 1`. Empty windows inside the range are kept with zero counts.
/// A range that cannot be aligned in `i64` or needs more than
/// [`MAX_WINDOWS`] windows is `InvalidWindow`.
pub fn bucket(
    samples: &[Sample],
    width: i64,
    axis: WindowAxis,
    exclude_global_top_emoji: bool,
) -> Result<Vec<WindowStat>> {
    if width <= 0 {
        return Err(Error::InvalidWindow(format!("{width} must be positive")));
    }
    let (Some(lo), Some(hi)) = (
        samples.iter().map(|s| s.key).min(),
        samples.iter().map(|s| s.key).max(),
    ) else {
        return Ok(Vec::new());
    };

    let out_of_range =
        || Error::InvalidWindow(format!("keys {lo}..={hi} do not fit windows of {width}"));
    let start = lo
        .div_euclid(width)
        .checked_mul(width)
        .ok_or_else(out_of_range)?;
    let count = hi
        .checked_sub(start)
        .map(|span| span / width)
        .and_then(|n| usize::try_from(n).ok())
        .and_then(|n| n.checked_add(1))
        .ok_or_else(out_of_range)?;
    if count > MAX_WINDOWS {
        return Err(Error::InvalidWindow(format!(
            "keys {lo}..={hi} need {count} windows of {width}, more than {MAX_WINDOWS}"
        )));
    }

    let excluded = if exclude_global_top_emoji {
        emoji::top(samples.iter().flat_map(|s| custom_emojis(&s.message)), None)
    } else {
        None
    };

    let mut authors: Vec<HashSet<&str>> = vec![HashSet::new(); count];
    let mut messages = vec![0usize; count];
    let mut emojis: Vec<BTreeMap<&str, usize>> = vec![BTreeMap::new(); count];

    // start <= key <= hi, so these differences cannot overflow.
    for s in samples {
        let k = ((s.key - start) / width) as usize;
        authors[k].insert(s.author.as_str());
        messages[k] += 1;
        for e in custom_emojis(&s.message) {
            *emojis[k].entry(e).or_default() += 1;
        }
    }

    let last_end = hi.saturating_add(1);
    Ok((0..count)
        .map(|k| {
            let window_start = start + k as i64 * width;
            WindowStat {
                axis,
                start: window_start,
                end: window_start.saturating_add(width).min(last_end),
                unique_authors: authors[k].len(),
                message_count: messages[k],
                top_emoji: emoji::top_of(&emojis[k], excluded.as_deref()),
            }
        })
        .collect())
}

impl Database {
    /// Per-window activity for one video. Unknown videos and videos with no
    /// message on the requested axis give an empty vector.
    pub fn aggregate(&self, video_id: &str, spec: &WindowSpec) -> Result<Vec<WindowStat>> {
        let width = spec
            .axis
            .units(spec.width)
            .filter(|w| *w > 0)
            .ok_or_else(|| Error::InvalidWindow(format!("{} must be positive", spec.width)))?;

        let samples = self.load_samples(video_id, spec)?;
        debug!(
            "Aggregating {} messages of {} into {:?} windows of {}",
            samples.len(),
            video_id,
            spec.axis,
            spec.width
        );
        bucket(&samples, width, spec.axis, spec.exclude_global_top_emoji)
    }

    fn load_samples(&self, video_id: &str, spec: &WindowSpec) -> Result<Vec<Sample>> {
        let duration_ms = if spec.stream_only {
            self.get_video(video_id)?.and_then(|v| v.duration).map(|d| d.num_milliseconds())
        } else {
            None
        };

        let key_column = match spec.axis {
            WindowAxis::Offset => "video_offset_time_msec",
            WindowAxis::WallClock => "timestamp",
        };
        let mut conditions = vec![
            "video_id = ?1".to_string(),
            format!("{key_column} IS NOT NULL"),
        ];
        if spec.stream_only {
            conditions.push("video_offset_time_msec > 0".into());
            if duration_ms.is_some() {
                conditions.push("video_offset_time_msec <= ?2".into());
            }
        }

        let sql = format!(
            "SELECT video_offset_time_msec, timestamp, author_channel_id, author, message
             FROM live_chat
             WHERE {}",
            conditions.join(" AND ")
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let mut all_params: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(video_id.to_string())];
        if let Some(d) = duration_ms {
            all_params.push(Box::new(d));
        }
        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            all_params.iter().map(|p| p.as_ref()).collect();

        let axis = spec.axis;
        let rows = stmt.query_map(param_refs.as_slice(), |row| {
            let key = match axis {
                WindowAxis::Offset => row.get::<_, Option<i64>>(0)?,
                WindowAxis::WallClock => row
                    .get::<_, Option<String>>(1)?
                    .as_deref()
                    .and_then(from_sql_timestamp)
                    .map(|t| t.timestamp_micros()),
            };
            let channel_id: Option<String> = row.get(2)?;
            let name: Option<String> = row.get(3)?;
            // Viewers without a channel id are told apart by display name.
            let author = channel_id
                .filter(|c| !c.is_empty())
                .or(name)
                .unwrap_or_default();
            let message: Option<String> = row.get(4)?;
            Ok(key.map(|key| Sample {
                key,
                author,
                message: message.unwrap_or_default(),
            }))
        })?;

        let mut samples = Vec::new();
        for row in rows {
            if let Some(sample) = row? {
                samples.push(sample);
            }
        }
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{ChatMessage, VideoMetadata};
    use crate::db::upsert::{upsert_message, upsert_video};
    use chrono::TimeZone;

    const FIVE_MIN_MS: i64 = 300_000;

    fn sample(key: i64, author: &str, message: &str) -> Sample {
        Sample {
            key,
            author: author.into(),
            message: message.into(),
        }
    }

    #[test]
    fn boundary_key_starts_the_next_window() {
        let samples = vec![sample(0, "a", ""), sample(FIVE_MIN_MS, "b", "")];
        let windows = bucket(&samples, FIVE_MIN_MS, WindowAxis::Offset, true).unwrap();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].message_count, 1);
        assert_eq!(windows[1].start, FIVE_MIN_MS);
        assert_eq!(windows[1].message_count, 1);
        assert_eq!(windows[1].end, FIVE_MIN_MS + 1);
    }

    #[test]
    fn windows_cover_the_range_without_gaps() {
        let samples = vec![
            sample(61_000, "a", ""),
            sample(62_000, "a", ""),
            sample(1_000_000, "b", ""),
            sample(1_999_999, "c", ""),
        ];
        let windows = bucket(&samples, FIVE_MIN_MS, WindowAxis::Offset, true).unwrap();

        assert_eq!(windows[0].start, 0);
        assert_eq!(windows.len() as i64, 1_999_999 / FIVE_MIN_MS + 1);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert!(windows.iter().all(|w| w.end - w.start <= FIVE_MIN_MS && w.end > w.start));
        assert_eq!(windows.last().unwrap().end, 2_000_000);
        assert_eq!(windows[0].unique_authors, 1);
        assert_eq!(windows[0].message_count, 2);
        assert_eq!(windows[1].message_count, 0);
        let total: usize = windows.iter().map(|w| w.message_count).sum();
        assert_eq!(total, samples.len());
    }

    #[test]
    fn negative_offsets_align_downward() {
        let samples = vec![sample(-30_000, "a", ""), sample(10_000, "b", "")];
        let windows = bucket(&samples, FIVE_MIN_MS, WindowAxis::Offset, true).unwrap();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].start, -FIVE_MIN_MS);
        assert_eq!(windows[0].end, 0);
        assert_eq!(windows[1].start, 0);
        assert_eq!(windows[0].start_label(), "-0:05:00");
    }

    #[test]
    fn top_emoji_skips_the_global_favorite() {
        let samples = vec![
            sample(0, "a", ":_hi: :_hi: :_hi:"),
            sample(1, "b", ":_lol: :_hi:"),
            sample(FIVE_MIN_MS, "c", ":_wow: :_hi: :_cry:"),
        ];
        let windows = bucket(&samples, FIVE_MIN_MS, WindowAxis::Offset, true).unwrap();
        assert_eq!(windows[0].top_emoji.as_deref(), Some(":_lol:"));
        // Tie between :_cry: and :_wow: goes to the smaller name.
        assert_eq!(windows[1].top_emoji.as_deref(), Some(":_cry:"));

        let windows = bucket(&samples, FIVE_MIN_MS, WindowAxis::Offset, false).unwrap();
        assert_eq!(windows[0].top_emoji.as_deref(), Some(":_hi:"));
    }

    #[test]
    fn extreme_keys_are_rejected_not_overflowed() {
        let samples = vec![sample(-i64::MAX, "a", ""), sample(i64::MAX, "b", "")];
        let err = bucket(&samples, FIVE_MIN_MS, WindowAxis::Offset, true).unwrap_err();
        assert!(matches!(err, Error::InvalidWindow(_)));

        let samples = vec![sample(0, "a", ""), sample(i64::MAX, "b", "")];
        let err = bucket(&samples, FIVE_MIN_MS, WindowAxis::Offset, true).unwrap_err();
        assert!(matches!(err, Error::InvalidWindow(_)));
    }

    #[test]
    fn single_key_at_the_top_of_the_range() {
        let samples = vec![sample(i64::MAX, "a", "")];
        let windows = bucket(&samples, FIVE_MIN_MS, WindowAxis::Offset, true).unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].end, i64::MAX);
        assert_eq!(windows[0].message_count, 1);
    }

    #[test]
    fn empty_input_gives_no_windows() {
        assert!(bucket(&[], FIVE_MIN_MS, WindowAxis::Offset, true).unwrap().is_empty());
    }

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        upsert_video(
            &db.conn,
            &VideoMetadata {
                video_id: "V1".into(),
                title: "Stream".into(),
                channel_id: "UC1".into(),
                channel_name: "Chan".into(),
                release_timestamp: Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()),
                timestamp: None,
                duration: Some(TimeDelta::minutes(10)),
                was_live: Some(true),
                filename: String::new(),
            },
        )
        .unwrap();

        let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let rows = [
            ("m0", -60_000, "UCa"),
            ("m1", 1_000, "UCa"),
            ("m2", 2_000, "UCb"),
            ("m3", 300_000, "UCa"),
            ("m4", 900_000, "UCc"),
        ];
        for (id, offset, author) in rows {
            upsert_message(
                &db.conn,
                &ChatMessage {
                    message_id: id.into(),
                    timestamp: base + TimeDelta::milliseconds(offset),
                    video_id: "V1".into(),
                    author: author.to_lowercase(),
                    author_channel_id: author.into(),
                    message: "hello".into(),
                    is_moderator: false,
                    is_channel_owner: false,
                    video_offset_time_msec: Some(offset),
                    video_offset_time_text: None,
                    filename: String::new(),
                },
            )
            .unwrap();
        }
        db
    }

    #[test]
    fn aggregate_counts_distinct_authors_per_window() {
        let db = seeded();
        let windows = db.aggregate("V1", &WindowSpec::minutes(5)).unwrap();
        let counts: Vec<(i64, usize, usize)> = windows
            .iter()
            .map(|w| (w.start, w.unique_authors, w.message_count))
            .collect();
        assert_eq!(
            counts,
            [
                (-300_000, 1, 1),
                (0, 2, 2),
                (300_000, 1, 1),
                (600_000, 0, 0),
                (900_000, 1, 1)
            ]
        );
    }

    #[test]
    fn stream_only_clips_to_the_broadcast() {
        let db = seeded();
        let windows = db
            .aggregate("V1", &WindowSpec::minutes(5).stream_only(true))
            .unwrap();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].start, 0);
        assert_eq!(windows[1].end, 300_001);
    }

    #[test]
    fn wall_clock_axis_uses_timestamps() {
        let db = seeded();
        let windows = db
            .aggregate("V1", &WindowSpec::minutes(5).axis(WindowAxis::WallClock))
            .unwrap();
        assert_eq!(windows.len(), 5);
        let first = windows[0].start_time().unwrap();
        assert_eq!(first, Utc.with_ymd_and_hms(2025, 12, 31, 23, 55, 0).unwrap());
    }

    #[test]
    fn extreme_stored_offsets_give_invalid_window() {
        let db = seeded();
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        for (id, offset) in [("x1", -i64::MAX), ("x2", i64::MAX)] {
            upsert_message(
                &db.conn,
                &ChatMessage {
                    message_id: id.into(),
                    timestamp: base,
                    video_id: "V1".into(),
                    author: "x".into(),
                    author_channel_id: "UCx".into(),
                    message: String::new(),
                    is_moderator: false,
                    is_channel_owner: false,
                    video_offset_time_msec: Some(offset),
                    video_offset_time_text: None,
                    filename: String::new(),
                },
            )
            .unwrap();
        }
        let err = db.aggregate("V1", &WindowSpec::minutes(5)).unwrap_err();
        assert!(matches!(err, Error::InvalidWindow(_)));
        // The wall-clock axis is unaffected.
        assert!(db
            .aggregate("V1", &WindowSpec::minutes(5).axis(WindowAxis::WallClock))
            .is_ok());
    }

    #[test]
    fn unknown_video_and_bad_width() {
        let db = seeded();
        assert!(db.aggregate("nope", &WindowSpec::default()).unwrap().is_empty());
        let err = db.aggregate("V1", &WindowSpec::minutes(0)).unwrap_err();
        assert!(matches!(err, Error::InvalidWindow(_)));
    }
}
