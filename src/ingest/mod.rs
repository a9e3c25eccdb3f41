pub mod discover;

use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::IngestConfig;
use crate::db::models::{ChatMessage, UpsertOutcome, VideoMetadata};
use crate::db::upsert::{upsert_message, upsert_video};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::normalize::chat::{normalize_line, ChatContext};
use crate::normalize::metadata::normalize_metadata;
use crate::normalize::Normalized;
use discover::{DiscoveryError, FileKind, InputFile};

/// A file that contributed nothing because it could not be processed.
#[derive(Debug, Clone, Serialize)]
pub struct FileError {
    pub path: PathBuf,
    pub message: String,
}

impl From<DiscoveryError> for FileError {
    fn from(e: DiscoveryError) -> Self {
        FileError {
            path: e.path,
            message: e.message,
        }
    }
}

/// Totals for one ingestion run. `skipped` is always `malformed + ignored`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestSummary {
    pub files_processed: usize,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub malformed: usize,
    pub ignored: usize,
    pub errors: Vec<FileError>,
}

impl IngestSummary {
    fn absorb(&mut self, tally: &FileTally) {
        self.files_processed += 1;
        self.inserted += tally.inserted;
        self.updated += tally.updated;
        self.malformed += tally.malformed;
        self.ignored += tally.ignored;
        self.skipped = self.malformed + self.ignored;
    }
}

#[derive(Debug, Default)]
struct FileTally {
    inserted: usize,
    updated: usize,
    malformed: usize,
    ignored: usize,
}

impl FileTally {
    fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
        }
    }
}

/// Everything normalized out of one file, ready to be written.
enum Parsed {
    Video(VideoMetadata),
    Messages(Vec<ChatMessage>),
}

/// Loads yt-dlp archives into a [`Database`].
pub struct Ingestor<'a> {
    db: &'a Database,
    config: IngestConfig,
    dry_run: bool,
}

impl<'a> Ingestor<'a> {
    pub fn new(db: &'a Database, config: IngestConfig) -> Self {
        Self {
            db,
            config,
            dry_run: false,
        }
    }

    /// Normalize and count without writing. Every record counts as inserted.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Ingest every recognized file under `dir`.
    pub fn ingest(&self, dir: &Path) -> Result<IngestSummary> {
        let mut files = Vec::new();
        let mut errors = Vec::new();
        discover::walk(dir, &self.config, &mut files, &mut errors);
        discover::order(&mut files);
        self.ingest_files(&files, errors)
    }

    /// Ingest directories, single files and glob patterns.
    pub fn ingest_paths(&self, inputs: &[String]) -> Result<IngestSummary> {
        let (files, errors) = discover::expand(inputs, &self.config);
        self.ingest_files(&files, errors)
    }

    fn ingest_files(
        &self,
        files: &[InputFile],
        discovery_errors: Vec<DiscoveryError>,
    ) -> Result<IngestSummary> {
        let mut summary = IngestSummary::default();
        for e in discovery_errors {
            warn!("Skipping {}: {}", e.path.display(), e.message);
            summary.errors.push(e.into());
        }

        for file in files {
            match self.ingest_file(file) {
                Ok(tally) => {
                    info!(
                        "Ingested {}: {} inserted, {} updated, {} malformed, {} ignored",
                        file.path.display(),
                        tally.inserted,
                        tally.updated,
                        tally.malformed,
                        tally.ignored
                    );
                    summary.absorb(&tally);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("{e}");
                    summary.errors.push(FileError {
                        path: file.path.clone(),
                        message: match e {
                            Error::FileAccess { message, .. } => message,
                            other => other.to_string(),
                        },
                    });
                }
            }
        }

        Ok(summary)
    }

    /// Normalize the whole file first, then write it in one transaction, so
    /// a file that fails to read contributes nothing.
    fn ingest_file(&self, file: &InputFile) -> Result<FileTally> {
        let mut tally = FileTally::default();
        let parsed = match file.kind {
            FileKind::Metadata => self.parse_metadata(&file.path, &mut tally)?,
            FileKind::ChatLog => self.parse_chat_log(&file.path, &mut tally)?,
        };

        if self.dry_run {
            tally.inserted += match &parsed {
                Some(Parsed::Video(_)) => 1,
                Some(Parsed::Messages(m)) => m.len(),
                None => 0,
            };
            return Ok(tally);
        }

        let tx = self.db.transaction()?;
        match &parsed {
            Some(Parsed::Video(video)) => tally.record(upsert_video(&tx, video)?),
            Some(Parsed::Messages(messages)) => {
                for message in messages {
                    tally.record(upsert_message(&tx, message)?);
                }
            }
            None => {}
        }
        tx.commit()?;

        Ok(tally)
    }

    fn parse_metadata(&self, path: &Path, tally: &mut FileTally) -> Result<Option<Parsed>> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_access(path, e))?;
        let doc: Value = serde_json::from_str(&content)
            .map_err(|e| Error::file_access(path, format!("not valid JSON: {e}")))?;

        match normalize_metadata(&doc, &path.display().to_string()).into_result() {
            Ok(Some(video)) => Ok(Some(Parsed::Video(video))),
            Ok(None) => {
                debug!("{}: ignored metadata document", path.display());
                tally.ignored += 1;
                Ok(None)
            }
            Err(e) => {
                debug!("{}: {e}", path.display());
                tally.malformed += 1;
                Ok(None)
            }
        }
    }

    fn parse_chat_log(&self, path: &Path, tally: &mut FileTally) -> Result<Option<Parsed>> {
        let video_id = discover::video_id_from_filename(path, &self.config.chat_suffix)
            .ok_or_else(|| Error::file_access(path, "cannot derive a video id from the filename"))?;
        let bytes = std::fs::read(path).map_err(|e| Error::file_access(path, e))?;
        let filename = path.display().to_string();
        let ctx = ChatContext {
            video_id: &video_id,
            filename: &filename,
        };

        let mut messages = Vec::new();
        for (idx, raw) in bytes.split(|b| *b == b'\n').enumerate() {
            let line_no = idx + 1;
            let line = match std::str::from_utf8(raw) {
                Ok(line) => line,
                Err(e) => {
                    debug!("{}:{line_no}: not UTF-8: {e}", path.display());
                    tally.malformed += 1;
                    continue;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            for outcome in normalize_line(line, ctx) {
                match outcome {
                    Normalized::Record(message) => messages.push(message),
                    Normalized::Ignored(kind) => {
                        debug!("{}:{line_no}: ignored {}", path.display(), kind.as_str());
                        tally.ignored += 1;
                    }
                    Normalized::Malformed(reason) => {
                        debug!("{}:{line_no}: {reason}", path.display());
                        tally.malformed += 1;
                    }
                }
            }
        }

        Ok(Some(Parsed::Messages(messages)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text_line(id: &str, usec: i64, offset: i64, text: &str) -> String {
        json!({
            "replayChatItemAction": {
                "actions": [{
                    "addChatItemAction": {
                        "item": {
                            "liveChatTextMessageRenderer": {
                                "id": id,
                                "timestampUsec": usec.to_string(),
                                "authorName": {"simpleText": "viewer"},
                                "authorExternalChannelId": "UCviewer",
                                "message": {"runs": [{"text": text}]},
                                "timestampText": {"simpleText": "0:01"}
                            }
                        }
                    }
                }]
            },
            "videoOffsetTimeMsec": offset.to_string()
        })
        .to_string()
    }

    #[test]
    fn dry_run_counts_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("s [abcdefghijk].live_chat.json"),
            format!(
                "{}\n\n{}\n",
                text_line("m1", 1767225600000000, 1000, "hi"),
                text_line("m2", 1767225660000000, 61000, "yo")
            ),
        )
        .unwrap();

        let db = Database::open_in_memory().unwrap();
        let summary = Ingestor::new(&db, IngestConfig::default())
            .dry_run(true)
            .ingest(dir.path())
            .unwrap();

        assert_eq!(summary.files_processed, 1);
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.skipped, 0);
        assert_eq!(db.stats().unwrap().message_count, 0);
    }

    #[test]
    fn invalid_metadata_json_is_a_file_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.info.json"), "{not json").unwrap();
        std::fs::write(
            dir.path().join("b.info.json"),
            json!({"id": "b", "title": "ok"}).to_string(),
        )
        .unwrap();

        let db = Database::open_in_memory().unwrap();
        let summary = Ingestor::new(&db, IngestConfig::default())
            .ingest(dir.path())
            .unwrap();

        assert_eq!(summary.files_processed, 1);
        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].path.ends_with("a.info.json"));
    }

    #[test]
    fn metadata_without_id_is_a_malformed_skip() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.info.json"),
            json!({"title": "no id here"}).to_string(),
        )
        .unwrap();

        let db = Database::open_in_memory().unwrap();
        let summary = Ingestor::new(&db, IngestConfig::default())
            .ingest(dir.path())
            .unwrap();

        assert_eq!(summary.files_processed, 1);
        assert_eq!(summary.inserted, 0);
        assert_eq!(summary.malformed, 1);
        assert_eq!(summary.skipped, 1);
        assert!(summary.errors.is_empty());
    }

    #[test]
    fn chat_log_without_video_id_is_a_file_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("Morning stream.live_chat.json"),
            text_line("m1", 1767225600000000, 0, "hi"),
        )
        .unwrap();

        let db = Database::open_in_memory().unwrap();
        let summary = Ingestor::new(&db, IngestConfig::default())
            .ingest(dir.path())
            .unwrap();

        assert_eq!(summary.files_processed, 0);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(db.stats().unwrap().message_count, 0);
    }

    #[test]
    fn custom_suffixes_are_honored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("V9.meta"),
            json!({"id": "V9"}).to_string(),
        )
        .unwrap();
        std::fs::write(dir.path().join("V9.info.json"), "{not read").unwrap();

        let config = IngestConfig {
            chat_suffix: ".chat".into(),
            metadata_suffix: ".meta".into(),
        };
        let db = Database::open_in_memory().unwrap();
        let summary = Ingestor::new(&db, config).ingest(dir.path()).unwrap();

        assert_eq!(summary.files_processed, 1);
        assert!(summary.errors.is_empty());
        assert!(db.get_video("V9").unwrap().is_some());
    }
}
