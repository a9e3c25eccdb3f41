use rusqlite::Connection;

pub const SCHEMA_VERSION: &str = "1";

pub fn create_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        -- Version tracking
        CREATE TABLE IF NOT EXISTS vodchat_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- One row per archived video
        CREATE TABLE IF NOT EXISTS video_metadata (
            video_id TEXT PRIMARY KEY,
            title TEXT,
            channel_id TEXT,
            channel_name TEXT,
            release_timestamp TEXT,
            timestamp TEXT,
            duration INTEGER,
            was_live INTEGER,
            filename TEXT
        );

        -- One row per chat message. video_id is not a foreign key; chat logs
        -- may arrive before their metadata.
        CREATE TABLE IF NOT EXISTS live_chat (
            message_id TEXT PRIMARY KEY,
            timestamp TEXT,
            video_id TEXT,
            author TEXT,
            author_channel_id TEXT,
            message TEXT,
            is_moderator INTEGER NOT NULL DEFAULT 0,
            is_channel_owner INTEGER NOT NULL DEFAULT 0,
            video_offset_time_msec INTEGER,
            video_offset_time_text TEXT,
            filename TEXT
        );

        -- Indexes for lookups by video, time range and stream offset
        CREATE INDEX IF NOT EXISTS idx_live_chat_video ON live_chat(video_id);
        CREATE INDEX IF NOT EXISTS idx_live_chat_timestamp ON live_chat(timestamp);
        CREATE INDEX IF NOT EXISTS idx_live_chat_video_offset
            ON live_chat(video_id, video_offset_time_msec);
        CREATE INDEX IF NOT EXISTS idx_video_metadata_aired
            ON video_metadata(COALESCE(release_timestamp, timestamp));
        CREATE INDEX IF NOT EXISTS idx_video_metadata_channel ON video_metadata(channel_id);
        ",
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO vodchat_meta (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION],
    )?;

    Ok(())
}
