use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// `[database]` block of config.toml.
#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

/// `[ingest]` block: how input files are recognized.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    pub chat_suffix: String,
    pub metadata_suffix: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chat_suffix: ".live_chat.json".to_string(),
            metadata_suffix: ".info.json".to_string(),
        }
    }
}

/// `[aggregate]` block.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct AggregateConfig {
    pub window_minutes: u32,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self { window_minutes: 5 }
    }
}

/// `[search]` block.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    /// Seconds subtracted from a match's offset when building watch links,
    /// so playback starts just before the message.
    pub lead_seconds: i64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { lead_seconds: 10 }
    }
}

/// Top-level vodchat config file structure.
#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub ingest: IngestConfig,
    pub aggregate: AggregateConfig,
    pub search: SearchConfig,
}

impl Config {
    /// Load config from the given path, or ~/.vodchat/config.toml. Returns the
    /// default if the file doesn't exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => config_path()?,
        };
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Resolve the database path: CLI flag (or env var, via clap) > config > default.
    pub fn database_path(&self, cli_flag: Option<&Path>) -> Result<PathBuf> {
        if let Some(p) = cli_flag {
            return Ok(expand_home(p));
        }
        if let Some(ref p) = self.database.path {
            return Ok(expand_home(p));
        }
        default_db_path()
    }

    /// Display the effective configuration as TOML.
    pub fn display(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_else(|e| format!("(unprintable config: {e})"))
    }
}

fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or_else(|| Error::Config("Could not determine home directory".into()))
}

fn expand_home(p: &Path) -> PathBuf {
    match p.strip_prefix("~") {
        Ok(rest) => dirs::home_dir().map(|h| h.join(rest)).unwrap_or_else(|| p.to_path_buf()),
        Err(_) => p.to_path_buf(),
    }
}

/// Default database path: ~/.vodchat/vodchat.db
pub fn default_db_path() -> Result<PathBuf> {
    Ok(home_dir()?.join(".vodchat").join("vodchat.db"))
}

/// Path to the config file: ~/.vodchat/config.toml
pub fn config_path() -> Result<PathBuf> {
    Ok(home_dir()?.join(".vodchat").join("config.toml"))
}

/// Default config template content.
pub fn default_config_template() -> &'static str {
    r#"# ~/.vodchat/config.toml
# Database path resolution order: --db flag > VODCHAT_DB env var > [database].path

[database]
# path = "~/.vodchat/vodchat.db"

[ingest]
chat_suffix = ".live_chat.json"
metadata_suffix = ".info.json"

[aggregate]
window_minutes = 5

[search]
lead_seconds = 10
"#
}

/// Create the default config file if it doesn't already exist.
pub fn init_config(path: Option<&Path>) -> Result<bool> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_path()?,
    };
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::Config(format!("failed to create {}: {e}", parent.display())))?;
    }
    std::fs::write(&path, default_config_template())
        .map_err(|e| Error::Config(format!("failed to write {}: {e}", path.display())))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_to_defaults() {
        let config = Config::from_toml(default_config_template()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = Config::from_toml("[aggregate]\nwindow_minutes = 1\n").unwrap();
        assert_eq!(config.aggregate.window_minutes, 1);
        assert_eq!(config.ingest.chat_suffix, ".live_chat.json");
        assert_eq!(config.search.lead_seconds, 10);
    }

    #[test]
    fn cli_flag_wins_over_config() {
        let config = Config::from_toml("[database]\npath = \"/srv/chat.db\"\n").unwrap();
        assert_eq!(
            config.database_path(Some(Path::new("/tmp/x.db"))).unwrap(),
            PathBuf::from("/tmp/x.db")
        );
        assert_eq!(config.database_path(None).unwrap(), PathBuf::from("/srv/chat.db"));
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn init_writes_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        assert!(init_config(Some(&path)).unwrap());
        assert!(!init_config(Some(&path)).unwrap());
        assert_eq!(Config::load(Some(&path)).unwrap(), Config::default());
    }
}
