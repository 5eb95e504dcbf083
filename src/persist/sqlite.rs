//! SQLite-backed append-only record journal.

use std::path::Path;

use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};

use crate::{
    core::table::SubmissionTable,
    record::{SubmissionRecord, format_timestamp},
};

use super::{LoadOutcome, PersistError, PersistResult, TableSink};

/// Version number for serialized [`RecordEnvelope`] payloads.
pub const RECORD_FORMAT_VERSION: u16 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RecordEnvelope {
    format_version: u16,
    record: SubmissionRecord,
}

/// SQLite implementation of [`crate::persist::TableSink`].
///
/// Only the columns and records not yet journaled are written, inside one
/// transaction, so a failed persist leaves the journal as it was.
pub struct SqliteTableSink {
    conn: Connection,
    location: String,
}

impl SqliteTableSink {
    /// Opens or creates a SQLite-backed sink at `path`.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        let location = path.as_ref().display().to_string();
        let conn = Connection::open(path)?;
        Self::init_connection(conn, location)
    }

    /// Opens an in-memory SQLite sink.
    pub fn open_in_memory() -> PersistResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn, ":memory:".to_string())
    }

    fn init_connection(conn: Connection, location: String) -> PersistResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self { conn, location })
    }

    /// Reads the journal into a table.
    pub fn read_table(&self) -> PersistResult<SubmissionTable> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM columns ORDER BY pos ASC")?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        let mut table = SubmissionTable::with_columns(columns);

        let mut stmt = self
            .conn
            .prepare("SELECT payload FROM records ORDER BY seq ASC")?;
        let payloads = stmt
            .query_map([], |row| row.get::<_, Vec<u8>>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        for payload in payloads {
            table.push(decode_record(&payload)?);
        }
        Ok(table)
    }

    /// Number of journaled records.
    pub fn record_count(&self) -> PersistResult<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

impl TableSink for SqliteTableSink {
    fn load(&mut self) -> LoadOutcome {
        match self.read_table() {
            Ok(table) => {
                tracing::info!(path = %self.location, records = table.len(), "loaded submissions");
                LoadOutcome::loaded(table)
            }
            Err(err) => LoadOutcome::degraded(self.location.clone(), err.to_string()),
        }
    }

    fn persist(&mut self, table: &SubmissionTable) -> PersistResult<()> {
        let tx = self.conn.transaction()?;
        {
            let stored_columns: i64 =
                tx.query_row("SELECT COUNT(*) FROM columns", [], |row| row.get(0))?;
            let stored_records: i64 =
                tx.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
            let (stored_columns, stored_records) = (stored_columns as usize, stored_records as usize);

            if stored_columns > table.columns().len() || stored_records > table.len() {
                return Err(PersistError::Corrupt(format!(
                    "journal holds {stored_records} records / {stored_columns} columns, table only {} / {}",
                    table.len(),
                    table.columns().len()
                )));
            }

            let mut stmt = tx.prepare("INSERT INTO columns(pos, name) VALUES (?1, ?2)")?;
            for (pos, name) in table.columns().iter().enumerate().skip(stored_columns) {
                stmt.execute(params![pos as i64, name])?;
            }

            let mut stmt = tx.prepare("INSERT INTO records(seq, ts, payload) VALUES (?1, ?2, ?3)")?;
            for (seq, record) in table.records().iter().enumerate().skip(stored_records) {
                let payload = serde_json::to_vec(&RecordEnvelope {
                    format_version: RECORD_FORMAT_VERSION,
                    record: record.clone(),
                })?;
                stmt.execute(params![
                    seq as i64,
                    format_timestamp(&record.timestamp),
                    payload
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn flush(&mut self) -> PersistResult<()> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(PASSIVE);")?;
        Ok(())
    }

    fn location(&self) -> String {
        self.location.clone()
    }
}

fn decode_record(payload: &[u8]) -> PersistResult<SubmissionRecord> {
    let envelope: RecordEnvelope = serde_json::from_slice(payload)?;
    if envelope.format_version != RECORD_FORMAT_VERSION {
        return Err(PersistError::Corrupt(format!(
            "unsupported record format version: {}",
            envelope.format_version
        )));
    }
    Ok(envelope.record)
}
