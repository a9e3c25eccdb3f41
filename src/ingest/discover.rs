//! Input discovery: which files to read, in what order, and what they are.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::config::IngestConfig;

/// What an input file holds, decided by its filename suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FileKind {
    Metadata,
    ChatLog,
}

impl FileKind {
    pub fn classify(path: &Path, config: &IngestConfig) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        if name.ends_with(&config.metadata_suffix) {
            Some(FileKind::Metadata)
        } else if name.ends_with(&config.chat_suffix) {
            Some(FileKind::ChatLog)
        } else {
            None
        }
    }
}

/// A file selected for ingestion.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct InputFile {
    pub kind: FileKind,
    pub path: PathBuf,
}

/// Unreadable directories or patterns that matched nothing, found during
/// discovery. Reported alongside per-file failures.
#[derive(Debug, Clone)]
pub struct DiscoveryError {
    pub path: PathBuf,
    pub message: String,
}

/// Recursively collect recognized files under `dir`.
pub fn walk(
    dir: &Path,
    config: &IngestConfig,
    files: &mut Vec<InputFile>,
    errors: &mut Vec<DiscoveryError>,
) {
    let read = match std::fs::read_dir(dir) {
        Ok(read) => read,
        Err(e) => {
            errors.push(DiscoveryError {
                path: dir.to_path_buf(),
                message: e.to_string(),
            });
            return;
        }
    };

    let mut entries: Vec<_> = read.filter_map(|e| e.ok()).map(|e| e.path()).collect();
    entries.sort();

    for path in entries {
        if path.is_dir() {
            walk(&path, config, files, errors);
        } else if path.is_file() {
            if let Some(kind) = FileKind::classify(&path, config) {
                files.push(InputFile { kind, path });
            }
        }
    }
}

/// Expand CLI arguments (directories, files, glob patterns) into input files.
pub fn expand(
    inputs: &[String],
    config: &IngestConfig,
) -> (Vec<InputFile>, Vec<DiscoveryError>) {
    let mut files = Vec::new();
    let mut errors = Vec::new();

    for input in inputs {
        let path = Path::new(input);
        if path.is_dir() {
            walk(path, config, &mut files, &mut errors);
        } else if path.is_file() {
            match FileKind::classify(path, config) {
                Some(kind) => files.push(InputFile {
                    kind,
                    path: path.to_path_buf(),
                }),
                None => errors.push(DiscoveryError {
                    path: path.to_path_buf(),
                    message: format!(
                        "not a metadata ({}) or chat log ({}) file",
                        config.metadata_suffix, config.chat_suffix
                    ),
                }),
            }
        } else {
            let matches: Vec<PathBuf> = match glob::glob(input) {
                Ok(paths) => paths.filter_map(|r| r.ok()).collect(),
                Err(e) => {
                    errors.push(DiscoveryError {
                        path: path.to_path_buf(),
                        message: format!("invalid path or glob pattern: {e}"),
                    });
                    continue;
                }
            };
            if matches.is_empty() {
                errors.push(DiscoveryError {
                    path: path.to_path_buf(),
                    message: "no files found".into(),
                });
                continue;
            }
            for entry in matches {
                if entry.is_dir() {
                    walk(&entry, config, &mut files, &mut errors);
                } else if let Some(kind) = FileKind::classify(&entry, config) {
                    files.push(InputFile { kind, path: entry });
                }
            }
        }
    }

    order(&mut files);
    (files, errors)
}

/// Metadata before chat logs, then by path. Duplicates from overlapping
/// arguments are dropped.
pub fn order(files: &mut Vec<InputFile>) {
    files.sort();
    files.dedup();
}

fn bracketed_id() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([A-Za-z0-9_-]+)\]").expect("valid video id regex"))
}

/// Video id of a chat log: the last `[id]` group in the filename
/// (`Title [dQw4w9WgXcQ].live_chat.json`), or the whole stem when the file
/// was saved under its bare id (`dQw4w9WgXcQ.live_chat.json`).
pub fn video_id_from_filename(path: &Path, chat_suffix: &str) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(chat_suffix).unwrap_or(name);

    if let Some(caps) = bracketed_id().captures_iter(stem).last() {
        return Some(caps[1].to_string());
    }

    let stem = stem.trim();
    if !stem.is_empty()
        && stem
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Some(stem.to_string());
    }
    None
}
