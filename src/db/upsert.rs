//! Every write the core performs goes through this module, and every write is
//! an upsert keyed by primary key. A new value only replaces a stored one when
//! it is non-null (and, for text, non-empty), so replaying identical input is a
//! no-op on content.

use rusqlite::{Connection, OptionalExtension};
use tracing::warn;

use super::models::{to_sql_timestamp, ChatMessage, UpsertOutcome, VideoMetadata};

pub fn upsert_video(conn: &Connection, v: &VideoMetadata) -> rusqlite::Result<UpsertOutcome> {
    let exists = conn
        .prepare_cached("SELECT 1 FROM video_metadata WHERE video_id = ?1")?
        .exists([&v.video_id])?;

    conn.prepare_cached(
        "INSERT INTO video_metadata (video_id, title, channel_id, channel_name,
                                     release_timestamp, timestamp, duration, was_live, filename)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT (video_id) DO UPDATE SET
            title = COALESCE(NULLIF(excluded.title, ''), video_metadata.title),
            channel_id = COALESCE(NULLIF(excluded.channel_id, ''), video_metadata.channel_id),
            channel_name = COALESCE(NULLIF(excluded.channel_name, ''), video_metadata.channel_name),
            release_timestamp = COALESCE(excluded.release_timestamp, video_metadata.release_timestamp),
            timestamp = COALESCE(excluded.timestamp, video_metadata.timestamp),
            duration = COALESCE(excluded.duration, video_metadata.duration),
            was_live = COALESCE(excluded.was_live, video_metadata.was_live),
            filename = COALESCE(NULLIF(excluded.filename, ''), video_metadata.filename)",
    )?
    .execute(rusqlite::params![
        v.video_id,
        v.title,
        v.channel_id,
        v.channel_name,
        v.release_timestamp.as_ref().map(to_sql_timestamp),
        v.timestamp.as_ref().map(to_sql_timestamp),
        v.duration.map(|d| d.num_milliseconds()),
        v.was_live,
        v.filename,
    ])?;

    Ok(if exists {
        UpsertOutcome::Updated
    } else {
        UpsertOutcome::Inserted
    })
}

pub fn upsert_message(conn: &Connection, m: &ChatMessage) -> rusqlite::Result<UpsertOutcome> {
    let previous_video: Option<Option<String>> = conn
        .prepare_cached("SELECT video_id FROM live_chat WHERE message_id = ?1")?
        .query_row([&m.message_id], |row| row.get(0))
        .optional()?;

    if let Some(Some(prev)) = &previous_video {
        if !prev.is_empty() && *prev != m.video_id {
            warn!(
                "message_id {} moves from video {} to {}; message ids may not be globally unique",
                m.message_id, prev, m.video_id
            );
        }
    }

    conn.prepare_cached(
        "INSERT INTO live_chat (message_id, timestamp, video_id, author, author_channel_id, message,
                                is_moderator, is_channel_owner, video_offset_time_msec,
                                video_offset_time_text, filename)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT (message_id) DO UPDATE SET
            timestamp = COALESCE(excluded.timestamp, live_chat.timestamp),
            video_id = COALESCE(NULLIF(excluded.video_id, ''), live_chat.video_id),
            author = COALESCE(NULLIF(excluded.author, ''), live_chat.author),
            author_channel_id = COALESCE(NULLIF(excluded.author_channel_id, ''), live_chat.author_channel_id),
            message = COALESCE(NULLIF(excluded.message, ''), live_chat.message),
            is_moderator = excluded.is_moderator,
            is_channel_owner = excluded.is_channel_owner,
            video_offset_time_msec = COALESCE(excluded.video_offset_time_msec, live_chat.video_offset_time_msec),
            video_offset_time_text = COALESCE(NULLIF(excluded.video_offset_time_text, ''), live_chat.video_offset_time_text),
            filename = COALESCE(NULLIF(excluded.filename, ''), live_chat.filename)",
    )?
    .execute(rusqlite::params![
        m.message_id,
        to_sql_timestamp(&m.timestamp),
        m.video_id,
        m.author,
        m.author_channel_id,
        m.message,
        m.is_moderator,
        m.is_channel_owner,
        m.video_offset_time_msec,
        m.video_offset_time_text,
        m.filename,
    ])?;

    Ok(if previous_video.is_some() {
        UpsertOutcome::Updated
    } else {
        UpsertOutcome::Inserted
    })
}
