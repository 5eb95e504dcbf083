use chrono::{DateTime, Utc};
use hashbrown::HashMap;

use crate::{
    questionnaire::Questionnaire,
    record::SubmissionRecord,
    types::{ColumnName, LANGUAGE_COLUMN, PHOTO_COLUMN, SURVEYOR_COLUMN, TIMESTAMP_COLUMN},
};

/// Ordered, append-only collection of [`SubmissionRecord`]s plus the column
/// set they are rendered under.
///
/// Columns only grow, and only at the right edge. Rows written before a
/// column existed read as absent for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionTable {
    columns: Vec<ColumnName>,
    pos: HashMap<ColumnName, usize>,
    records: Vec<SubmissionRecord>,
}

impl SubmissionTable {
    /// Empty table with no columns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty table with the given header.
    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ColumnName>,
    {
        let mut table = Self::new();
        for column in columns {
            table.ensure_column(column.into());
        }
        table
    }

    /// Empty table whose header lists the fixed columns and every
    /// question's canonical label in declaration order.
    pub fn for_questionnaire(questionnaire: &Questionnaire) -> Self {
        let mut columns = vec![TIMESTAMP_COLUMN.to_string(), SURVEYOR_COLUMN.to_string()];
        columns.extend(questionnaire.question_columns());
        columns.push(PHOTO_COLUMN.to_string());
        columns.push(LANGUAGE_COLUMN.to_string());
        Self::with_columns(columns)
    }

    /// Header in display order.
    pub fn columns(&self) -> &[ColumnName] {
        &self.columns
    }

    /// Returns true when `column` is part of the header.
    pub fn has_column(&self, column: &str) -> bool {
        self.pos.contains_key(column)
    }

    /// Records in insertion order.
    pub fn records(&self) -> &[SubmissionRecord] {
        &self.records
    }

    /// Record at `index`.
    pub fn get(&self, index: usize) -> Option<&SubmissionRecord> {
        self.records.get(index)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true when no record has been appended.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Timestamp of the newest record.
    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.records.last().map(|r| r.timestamp)
    }

    /// Adds every unseen column, in the given order, at the right edge.
    /// Returns how many were added.
    pub fn ensure_columns<I, S>(&mut self, columns: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<ColumnName>,
    {
        columns
            .into_iter()
            .map(|c| self.ensure_column(c.into()))
            .filter(|added| *added)
            .count()
    }

    /// Appends `record`, widening the header with any column it introduces.
    /// Returns the record's index.
    pub fn push(&mut self, record: SubmissionRecord) -> usize {
        let mut unseen: Vec<String> = record
            .column_names()
            .filter(|c| !self.pos.contains_key(*c))
            .map(str::to_string)
            .collect();
        unseen.sort();
        for column in unseen {
            self.ensure_column(column);
        }

        self.records.push(record);
        self.records.len() - 1
    }

    /// Case-insensitive substring search over every column of every record,
    /// in insertion order. An empty term matches everything.
    pub fn query(&self, term: &str) -> Vec<&SubmissionRecord> {
        let needle = term.trim().to_lowercase();
        self.records
            .iter()
            .filter(|record| needle.is_empty() || self.matches(record, &needle))
            .collect()
    }

    /// Owned variant of [`SubmissionTable::query`].
    pub fn query_cloned(&self, term: &str) -> Vec<SubmissionRecord> {
        self.query(term).into_iter().cloned().collect()
    }

    /// Table restricted to records matching `term`, same header.
    pub fn filtered(&self, term: &str) -> Self {
        let mut out = Self::with_columns(self.columns.iter().cloned());
        out.records = self.query_cloned(term);
        out
    }

    /// Renders the whole table as CSV, header first.
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>, crate::persist::PersistError> {
        crate::persist::csv::encode_table(self)
    }

    /// Drops records and columns added after the table had `columns`
    /// columns and `records` records. Undoes a failed append.
    pub(crate) fn rollback(&mut self, columns: usize, records: usize) {
        self.records.truncate(records);
        for column in self.columns.drain(columns.min(self.columns.len())..) {
            self.pos.remove(&column);
        }
    }

    fn matches(&self, record: &SubmissionRecord, needle: &str) -> bool {
        self.columns
            .iter()
            .filter_map(|column| record.value(column))
            .any(|value| value.to_lowercase().contains(needle))
    }

    fn ensure_column(&mut self, column: ColumnName) -> bool {
        if self.pos.contains_key(&column) {
            return false;
        }
        self.pos.insert(column.clone(), self.columns.len());
        self.columns.push(column);
        true
    }
}
