pub mod bursts;
pub mod filters;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;

use crate::db::models::{timestamp_column, VideoSummary};
use crate::db::Database;
use crate::error::{Error, Result};
pub use bursts::bursts;
use filters::VideoFilters;

/// A regex search over chat text. Patterns are OR'ed and case-sensitive.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub patterns: Vec<String>,
    /// Include author and message text in the results.
    pub debug: bool,
}

impl SearchQuery {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
            debug: false,
        }
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Compile every pattern up front so a typo fails the whole search
    /// instead of silently matching nothing.
    pub fn validate(&self) -> Result<()> {
        for pattern in &self.patterns {
            Regex::new(pattern).map_err(|e| Error::InvalidPattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
        }
        Ok(())
    }
}

/// One matched chat message with its video context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessageView {
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
    pub video_id: String,
    pub title: Option<String>,
    pub aired_at: Option<DateTime<Utc>>,
    pub video_offset_time_msec: Option<i64>,
    pub video_offset_time_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ChatMessageView {
    /// Seconds into the video. Uses the recorded offset when positive,
    /// otherwise the distance from the air date.
    pub fn offset_seconds(&self) -> Option<i64> {
        match self.video_offset_time_msec {
            Some(ms) if ms > 0 => Some((ms + 999) / 1000),
            _ => self
                .aired_at
                .map(|aired| (self.timestamp - aired).num_seconds()),
        }
    }

    pub fn video_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.video_id)
    }

    /// Link that starts playback `lead_seconds` before the message.
    pub fn watch_url(&self, lead_seconds: i64) -> String {
        let t = self
            .offset_seconds()
            .map(|s| (s - lead_seconds).max(0))
            .unwrap_or(0);
        format!("{}&t={t}s", self.video_url())
    }
}

impl Database {
    /// Messages whose text matches any of the query's patterns, oldest first.
    pub fn search(&self, query: &SearchQuery) -> Result<Vec<ChatMessageView>> {
        query.validate()?;
        if query.patterns.is_empty() {
            return Ok(Vec::new());
        }

        let where_clause = (1..=query.patterns.len())
            .map(|i| format!("lc.message REGEXP ?{i}"))
            .collect::<Vec<_>>()
            .join(" OR ");

        let sql = format!(
            "SELECT lc.message_id, lc.timestamp, lc.video_id, vm.title,
                    COALESCE(vm.release_timestamp, vm.timestamp),
                    lc.video_offset_time_msec, lc.video_offset_time_text,
                    lc.author, lc.message
             FROM live_chat lc
             LEFT JOIN video_metadata vm ON vm.video_id = lc.video_id
             WHERE {where_clause}
             ORDER BY lc.timestamp ASC, lc.message_id ASC"
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let params = rusqlite::params_from_iter(query.patterns.iter());
        let debug = query.debug;

        let rows = stmt.query_map(params, |row| {
            let timestamp = timestamp_column(row, 1)?.ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    1,
                    rusqlite::types::Type::Null,
                    "chat message without timestamp".into(),
                )
            })?;
            Ok(ChatMessageView {
                message_id: row.get(0)?,
                timestamp,
                video_id: row.get(2)?,
                title: row.get(3)?,
                aired_at: timestamp_column(row, 4)?,
                video_offset_time_msec: row.get(5)?,
                video_offset_time_text: row.get(6)?,
                author: if debug { row.get(7)? } else { None },
                message: if debug { row.get(8)? } else { None },
            })
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// List videos with optional filters, most recently aired first.
    pub fn list_videos(&self, filters: &VideoFilters, limit: usize) -> Result<Vec<VideoSummary>> {
        let (filter_conditions, filter_params) = filters.conditions();

        let where_clause = if filter_conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", filter_conditions.join(" AND "))
        };

        let sql = format!(
            "SELECT vm.video_id, vm.title, vm.channel_name,
                    COALESCE(vm.release_timestamp, vm.timestamp) AS aired,
                    vm.duration, vm.was_live,
                    (SELECT COUNT(*) FROM live_chat lc WHERE lc.video_id = vm.video_id)
             FROM video_metadata vm
             {where_clause}
             ORDER BY aired DESC, vm.video_id ASC
             LIMIT ?{}",
            filter_params.len() + 1
        );

        let mut stmt = self.conn.prepare(&sql)?;

        let mut all_params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        for p in filter_params {
            all_params.push(p);
        }
        all_params.push(Box::new(limit as i64));

        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt.query_map(param_refs.as_slice(), |row| {
            Ok(VideoSummary {
                video_id: row.get(0)?,
                title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                channel_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                aired_at: timestamp_column(row, 3)?,
                duration_ms: row.get(4)?,
                was_live: row.get(5)?,
                message_count: row.get(6)?,
            })
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }
}
