//! CSV-file sink with whole-file atomic replacement.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use hashbrown::{HashMap, HashSet};

use crate::{
    core::table::SubmissionTable,
    record::{SubmissionRecord, parse_timestamp},
    types::{LANGUAGE_COLUMN, PHOTO_COLUMN, SURVEYOR_COLUMN, TIMESTAMP_COLUMN},
};

use super::{LoadOutcome, PersistError, PersistResult, TableSink};

/// Stores the table as one UTF-8 CSV file.
///
/// Each persist writes a `.tmp` sibling and renames it over the target, so
/// concurrent readers only ever see a complete file. A file that fails to
/// load is moved aside to `<name>.corrupt-<ts>` before the first persist
/// replaces it.
#[derive(Debug)]
pub struct CsvTableSink {
    path: PathBuf,
    seen: bool,
    unreadable: bool,
}

impl CsvTableSink {
    /// Sink for the file at `path`. Nothing is touched until used.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            seen: false,
            unreadable: false,
        }
    }

    /// Target file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        self.sibling(".tmp")
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(suffix);
        self.path.with_file_name(name)
    }

    /// Moves a file that failed to load out of the way, keeping its bytes.
    fn quarantine(&mut self) -> PersistResult<()> {
        if self.path.exists() {
            let stamp = Utc::now().format("%Y%m%dT%H%M%S%6f");
            let aside = self.sibling(&format!(".corrupt-{stamp}"));
            fs::rename(&self.path, &aside)?;
            tracing::warn!(
                path = %self.path.display(),
                kept = %aside.display(),
                "unreadable table moved aside before rewrite"
            );
        }
        self.unreadable = false;
        Ok(())
    }
}

impl TableSink for CsvTableSink {
    fn load(&mut self) -> LoadOutcome {
        let location = self.location();
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                if self.seen {
                    return LoadOutcome::degraded(location, "file disappeared");
                }
                tracing::info!(path = %location, "no stored submissions yet");
                return LoadOutcome::loaded(SubmissionTable::new());
            }
            Err(err) => {
                self.unreadable = true;
                return LoadOutcome::degraded(location, err.to_string());
            }
        };

        match decode_table(&bytes) {
            Ok(table) => {
                self.seen = true;
                tracing::info!(path = %location, records = table.len(), "loaded submissions");
                LoadOutcome::loaded(table)
            }
            Err(err) => {
                self.unreadable = true;
                LoadOutcome::degraded(location, err.to_string())
            }
        }
    }

    fn persist(&mut self, table: &SubmissionTable) -> PersistResult<()> {
        let bytes = encode_table(table)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        if self.unreadable {
            self.quarantine()?;
        }

        let tmp = self.tmp_path();
        let written = (|| -> PersistResult<()> {
            let mut file = File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)?;
            Ok(())
        })();
        if written.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        written?;

        self.seen = true;
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Renders `table` as CSV: the header, then one row per record.
pub fn encode_table(table: &SubmissionTable) -> PersistResult<Vec<u8>> {
    let mut writer = ::csv::Writer::from_writer(Vec::new());
    writer.write_record(table.columns())?;
    for record in table.records() {
        writer.write_record(
            table
                .columns()
                .iter()
                .map(|column| record.value(column).unwrap_or_default()),
        )?;
    }
    writer
        .into_inner()
        .map_err(|err| PersistError::Io(err.into_error()))
}

/// Parses CSV produced by [`encode_table`]. Empty cells read as absent.
pub fn decode_table(bytes: &[u8]) -> PersistResult<SubmissionTable> {
    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);

    let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if header.iter().all(|h| h.trim().is_empty()) {
        return Err(PersistError::Corrupt("missing header row".to_string()));
    }

    let mut unique = HashSet::with_capacity(header.len());
    for column in &header {
        if !unique.insert(column.as_str()) {
            return Err(PersistError::Corrupt(format!("duplicate column `{column}`")));
        }
    }
    let ts_idx = header
        .iter()
        .position(|h| h == TIMESTAMP_COLUMN)
        .ok_or_else(|| PersistError::Corrupt(format!("no `{TIMESTAMP_COLUMN}` column")))?;

    let mut table = SubmissionTable::with_columns(header.iter().cloned());
    for (row_no, row) in reader.records().enumerate() {
        let row = row?;
        let raw_ts = row.get(ts_idx).unwrap_or_default();
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| {
            PersistError::Corrupt(format!("row {}: bad timestamp `{raw_ts}`", row_no + 1))
        })?;

        let mut record = SubmissionRecord {
            timestamp,
            surveyor_name: String::new(),
            language: None,
            cells: HashMap::new(),
            attached_blob_ref: None,
        };
        for (column, value) in header.iter().zip(row.iter()) {
            if value.is_empty() {
                continue;
            }
            match column.as_str() {
                TIMESTAMP_COLUMN => {}
                SURVEYOR_COLUMN => record.surveyor_name = value.to_string(),
                PHOTO_COLUMN => record.attached_blob_ref = Some(value.to_string()),
                LANGUAGE_COLUMN => record.language = Some(value.to_string()),
                other => {
                    record.cells.insert(other.to_string(), value.to_string());
                }
            }
        }
        table.push(record);
    }

    Ok(table)
}
