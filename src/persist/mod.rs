/// CSV-file sink; the canonical on-disk format.
pub mod csv;
/// SQLite-backed record journal.
pub mod sqlite;

use crate::{
    config::{Backend, SurveyConfig},
    core::table::SubmissionTable,
};

/// Failure to read or write persisted submissions.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// Filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// CSV encoding or decoding failure.
    #[error("csv error: {0}")]
    Csv(#[from] ::csv::Error),
    /// SQLite failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// JSON payload failure.
    #[error("payload error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Stored data is readable but inconsistent.
    #[error("corrupt store: {0}")]
    Corrupt(String),
}

/// Result alias for persistence operations.
pub type PersistResult<T> = Result<T, PersistError>;

/// Storage was present but could not be used; an empty table was returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadDegraded {
    /// Where the sink looked.
    pub location: String,
    /// Why the stored data was discarded.
    pub reason: String,
}

/// What a sink produced at startup.
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    /// Loaded table; empty when nothing usable was stored.
    pub table: SubmissionTable,
    /// Set when stored data existed but had to be ignored.
    pub warning: Option<LoadDegraded>,
}

impl LoadOutcome {
    /// Clean load of `table`.
    pub fn loaded(table: SubmissionTable) -> Self {
        Self {
            table,
            warning: None,
        }
    }

    /// Empty table plus a degradation warning.
    pub fn degraded(location: impl Into<String>, reason: impl Into<String>) -> Self {
        let warning = LoadDegraded {
            location: location.into(),
            reason: reason.into(),
        };
        tracing::warn!(location = %warning.location, reason = %warning.reason, "submission store unreadable, starting empty");
        Self {
            table: SubmissionTable::new(),
            warning: Some(warning),
        }
    }
}

/// Durable home of a [`SubmissionTable`].
pub trait TableSink: Send {
    /// Reads the persisted table. Never fails; unusable data degrades to an
    /// empty table with a warning.
    fn load(&mut self) -> LoadOutcome;

    /// Makes `table` the persisted state. Either the whole table becomes
    /// visible to readers or nothing changes.
    fn persist(&mut self, table: &SubmissionTable) -> PersistResult<()>;

    /// Forces buffered state to stable storage.
    fn flush(&mut self) -> PersistResult<()> {
        Ok(())
    }

    /// Human-readable location for logs.
    fn location(&self) -> String;
}

/// Opens the sink selected by `config.backend` at `config.store_path()`.
pub fn open_sink(config: &SurveyConfig) -> PersistResult<Box<dyn TableSink>> {
    let path = config.store_path();
    match config.backend {
        Backend::Csv => Ok(Box::new(csv::CsvTableSink::open(path))),
        Backend::Sqlite => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            Ok(Box::new(sqlite::SqliteTableSink::open(path)?))
        }
    }
}

/// Reads the configured table without creating anything on disk.
///
/// A missing store loads as an empty table.
pub fn load_table(config: &SurveyConfig) -> PersistResult<LoadOutcome> {
    let path = config.store_path();
    match config.backend {
        Backend::Csv => Ok(csv::CsvTableSink::open(path).load()),
        Backend::Sqlite if !path.exists() => Ok(LoadOutcome::loaded(SubmissionTable::new())),
        Backend::Sqlite => Ok(sqlite::SqliteTableSink::open(path)?.load()),
    }
}
