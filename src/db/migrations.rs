use rusqlite::Connection;
use tracing::info;

/// Run all pending migrations on top of the base schema from schema.rs.
pub fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS vodchat_migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        );",
    )?;

    run_migration(conn, 1, "live_chat_trigram_index", |c| {
        c.execute_batch(
            "
            -- Trigram FTS5 index over chat text (content-sync mode)
            CREATE VIRTUAL TABLE IF NOT EXISTS live_chat_fts USING fts5(
                message,
                content='live_chat',
                content_rowid='rowid',
                tokenize='trigram'
            );

            CREATE TRIGGER IF NOT EXISTS live_chat_ai AFTER INSERT ON live_chat BEGIN
                INSERT INTO live_chat_fts(rowid, message) VALUES (new.rowid, new.message);
            END;

            CREATE TRIGGER IF NOT EXISTS live_chat_ad AFTER DELETE ON live_chat BEGIN
                INSERT INTO live_chat_fts(live_chat_fts, rowid, message)
                VALUES ('delete', old.rowid, old.message);
            END;

            CREATE TRIGGER IF NOT EXISTS live_chat_au AFTER UPDATE OF message ON live_chat BEGIN
                INSERT INTO live_chat_fts(live_chat_fts, rowid, message)
                VALUES ('delete', old.rowid, old.message);
                INSERT INTO live_chat_fts(rowid, message) VALUES (new.rowid, new.message);
            END;

            -- Backfill rows written before the index existed
            INSERT INTO live_chat_fts(live_chat_fts) VALUES('rebuild');
            ",
        )
    })?;

    Ok(())
}

fn run_migration<F>(conn: &Connection, id: i64, name: &str, f: F) -> rusqlite::Result<()>
where
    F: FnOnce(&Connection) -> rusqlite::Result<()>,
{
    let already_applied: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM vodchat_migrations WHERE id = ?1",
        [id],
        |row| row.get(0),
    )?;

    if already_applied {
        return Ok(());
    }

    f(conn)?;

    conn.execute(
        "INSERT INTO vodchat_migrations (id, name) VALUES (?1, ?2)",
        rusqlite::params![id, name],
    )?;

    info!("Applied migration {id}: {name}");
    Ok(())
}
