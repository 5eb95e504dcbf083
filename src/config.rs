//! Deployment configuration loaded from TOML.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{session::AttachmentPolicy, types::DEFAULT_LANGUAGE};

/// Failure to read or parse a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File exists but could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// Offending file.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },
    /// File is not valid configuration TOML.
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Which sink stores the submission table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// One CSV file, replaced atomically on every append.
    #[default]
    Csv,
    /// SQLite record journal.
    Sqlite,
}

/// Settings for a survey deployment. Every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurveyConfig {
    /// Directory holding the submission table.
    pub data_dir: PathBuf,
    /// File name of the submission table inside `data_dir`.
    pub table_file: String,
    /// Directory holding uploaded photos.
    pub photos_dir: PathBuf,
    /// Storage backend for the table.
    pub backend: Backend,
    /// Canonical display language.
    pub default_language: String,
    /// Identities allowed into the admin view.
    pub admin_emails: Vec<String>,
    /// Photo extensions accepted at upload; empty accepts any.
    pub allowed_photo_extensions: Vec<String>,
    /// Persist attempts per append before giving up.
    pub persist_attempts: u32,
    /// Delay between persist attempts, multiplied by the attempt number.
    pub persist_backoff_ms: u64,
    /// Upper bound on one submit through the runtime.
    pub append_timeout_ms: u64,
    /// Capacity of the runtime's command queue.
    pub command_queue_bound: usize,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("responses"),
            table_file: "all_survey_responses_persistent.csv".to_string(),
            photos_dir: PathBuf::from("photos"),
            backend: Backend::Csv,
            default_language: DEFAULT_LANGUAGE.to_string(),
            admin_emails: Vec::new(),
            allowed_photo_extensions: AttachmentPolicy::default().allowed_extensions,
            persist_attempts: 3,
            persist_backoff_ms: 50,
            append_timeout_ms: 5_000,
            command_queue_bound: 64,
        }
    }
}

impl SurveyConfig {
    /// Parses TOML; missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads `path`; a missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml_str(&text),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Full path of the submission table.
    pub fn table_path(&self) -> PathBuf {
        self.data_dir.join(&self.table_file)
    }

    /// File backing the configured [`Backend`].
    pub fn store_path(&self) -> PathBuf {
        match self.backend {
            Backend::Csv => self.table_path(),
            Backend::Sqlite => self.table_path().with_extension("db"),
        }
    }

    /// Directory of stored photos.
    pub fn photos_path(&self) -> &Path {
        &self.photos_dir
    }

    /// Attachment allow-list for new sessions.
    pub fn attachment_policy(&self) -> AttachmentPolicy {
        AttachmentPolicy {
            allowed_extensions: self
                .allowed_photo_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }
}
