//! Finalized, immutable survey responses.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::types::{
    ColumnName, LANGUAGE_COLUMN, LanguageCode, PHOTO_COLUMN, SURVEYOR_COLUMN, TIMESTAMP_COLUMN,
};

/// One stored survey response.
///
/// Answer cells are keyed by column name (the question's label), so the
/// persisted table describes itself. A missing key is an absent value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    /// Creation instant, assigned by the store.
    pub timestamp: DateTime<Utc>,
    /// Name of the surveyor who filled the form.
    pub surveyor_name: String,
    /// Language the form was filled in, when known.
    pub language: Option<LanguageCode>,
    /// Answer cells keyed by column name.
    pub cells: HashMap<ColumnName, String>,
    /// Key of the stored photo, if one was saved.
    pub attached_blob_ref: Option<String>,
}

impl SubmissionRecord {
    /// Rendered value of `column`, including the fixed columns.
    pub fn value(&self, column: &str) -> Option<String> {
        match column {
            TIMESTAMP_COLUMN => Some(format_timestamp(&self.timestamp)),
            SURVEYOR_COLUMN => Some(self.surveyor_name.clone()),
            PHOTO_COLUMN => self.attached_blob_ref.clone(),
            LANGUAGE_COLUMN => self.language.clone(),
            other => self.cells.get(other).cloned(),
        }
    }

    /// Column names this record has a value for, fixed columns first.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        [TIMESTAMP_COLUMN, SURVEYOR_COLUMN]
            .into_iter()
            .chain(self.attached_blob_ref.as_ref().map(|_| PHOTO_COLUMN))
            .chain(self.language.as_ref().map(|_| LANGUAGE_COLUMN))
            .chain(self.cells.keys().map(String::as_str))
    }
}

/// RFC 3339 rendering with microseconds, as written to storage.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses a stored timestamp.
///
/// Offset-less ISO-8601 values, as found in older tables, are read as UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc())
}

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
