use chrono::{DateTime, Datelike, NaiveDate, SecondsFormat, TimeDelta, Utc};
use serde::{Serialize, Serializer};

/// One archived video, as stored in `video_metadata`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoMetadata {
    pub video_id: String,
    pub title: String,
    pub channel_id: String,
    pub channel_name: String,
    pub release_timestamp: Option<DateTime<Utc>>,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "duration_ms", serialize_with = "serialize_duration_ms")]
    pub duration: Option<TimeDelta>,
    pub was_live: Option<bool>,
    pub filename: String,
}

impl VideoMetadata {
    /// Effective air date: `coalesce(release_timestamp, timestamp)`.
    pub fn aired_at(&self) -> Option<DateTime<Utc>> {
        self.release_timestamp.or(self.timestamp)
    }
}

/// One chat message, as stored in `live_chat`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
    pub video_id: String,
    pub author: String,
    pub author_channel_id: String,
    pub message: String,
    pub is_moderator: bool,
    pub is_channel_owner: bool,
    pub video_offset_time_msec: Option<i64>,
    pub video_offset_time_text: Option<String>,
    pub filename: String,
}

/// Whether an upsert created a row or overwrote an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Row returned by `vodchat videos`.
#[derive(Debug, Clone, Serialize)]
pub struct VideoSummary {
    pub video_id: String,
    pub title: String,
    pub channel_name: String,
    pub aired_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub was_live: Option<bool>,
    pub message_count: i64,
}

/// Stats returned by `vodchat stats`.
#[derive(Debug, Clone, Serialize)]
pub struct DbStats {
    pub video_count: i64,
    pub message_count: i64,
    pub channel_count: i64,
    pub author_count: i64,
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
    pub db_size_bytes: u64,
}

/// Days without an aired video, returned by `vodchat gaps`.
#[derive(Debug, Clone, Serialize)]
pub struct MissingDays {
    pub since: NaiveDate,
    pub until: NaiveDate,
    pub days: Vec<NaiveDate>,
}

/// Whether `ts` has a four-digit year, the range [`to_sql_timestamp`] keeps
/// fixed-width and readable as RFC 3339.
pub fn is_storable(ts: &DateTime<Utc>) -> bool {
    (0..=9999).contains(&ts.year())
}

/// Fixed-width UTC text form used for every timestamp column, so that text
/// ordering in SQLite equals chronological ordering.
pub fn to_sql_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn from_sql_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Read a nullable timestamp column, rejecting text that is not RFC 3339.
pub fn timestamp_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        None => Ok(None),
        Some(s) => from_sql_timestamp(&s).map(Some).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                format!("invalid timestamp: {s}").into(),
            )
        }),
    }
}

fn serialize_duration_ms<S: Serializer>(value: &Option<TimeDelta>, s: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(d) => s.serialize_some(&d.num_milliseconds()),
        None => s.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn sql_timestamps_are_fixed_width_and_ordered() {
        let whole = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let later = whole + TimeDelta::microseconds(1);
        let a = to_sql_timestamp(&whole);
        let b = to_sql_timestamp(&later);
        assert_eq!(a, "2026-01-01T00:00:00.000000Z");
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(from_sql_timestamp(&b), Some(later));
    }

    #[test]
    fn aired_at_prefers_release_timestamp() {
        let release = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let observed = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
        let mut video = VideoMetadata {
            video_id: "V1".into(),
            title: String::new(),
            channel_id: String::new(),
            channel_name: String::new(),
            release_timestamp: Some(release),
            timestamp: Some(observed),
            duration: None,
            was_live: None,
            filename: String::new(),
        };
        assert_eq!(video.aired_at(), Some(release));
        video.release_timestamp = None;
        assert_eq!(video.aired_at(), Some(observed));
    }
}
