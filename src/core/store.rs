use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use hashbrown::HashMap;

use crate::{
    blob::{BlobStore, BlobWriteFailure, DirBlobStore, photo_key, unused_key},
    config::SurveyConfig,
    persist::{LoadDegraded, PersistError, PersistResult, TableSink, open_sink},
    questionnaire::Questionnaire,
    record::SubmissionRecord,
    session::{AttachmentPolicy, FormSession},
    types::{LANGUAGE_COLUMN, LanguageCode, PHOTO_COLUMN, SURVEYOR_COLUMN, Stage, TIMESTAMP_COLUMN},
};

use super::table::SubmissionTable;

/// Failure of [`SubmissionStore::append`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Only sessions pending review can be submitted.
    #[error("session is {0:?}, expected PendingReview")]
    NotPendingReview(Stage),
    /// The table could not be persisted; nothing was appended.
    #[error("persist failed after {attempts} attempt(s): {source}")]
    Persist {
        /// Attempts made.
        attempts: u32,
        /// Last failure.
        #[source]
        source: PersistError,
    },
}

/// Tuning for [`SubmissionStore`].
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Persist attempts per append; values below one count as one.
    pub persist_attempts: u32,
    /// Base delay between attempts, multiplied by the attempt number.
    pub persist_backoff: Duration,
    /// Attachment allow-list handed to new sessions.
    pub attachment_policy: AttachmentPolicy,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::from(&SurveyConfig::default())
    }
}

impl From<&SurveyConfig> for StoreOptions {
    fn from(config: &SurveyConfig) -> Self {
        Self {
            persist_attempts: config.persist_attempts,
            persist_backoff: Duration::from_millis(config.persist_backoff_ms),
            attachment_policy: config.attachment_policy(),
        }
    }
}

/// Result of a successful append.
#[derive(Debug)]
pub struct SubmitOutcome {
    /// Position of the new record in the table.
    pub index: usize,
    /// The stored record.
    pub record: SubmissionRecord,
    /// Set when the attached photo could not be stored. The record was
    /// saved regardless, without a photo reference.
    pub blob_error: Option<BlobWriteFailure>,
}

/// Owner of the submission table: the only component that appends to it
/// and persists it.
pub struct SubmissionStore {
    questionnaire: Arc<Questionnaire>,
    table: SubmissionTable,
    sink: Box<dyn TableSink>,
    blobs: Arc<dyn BlobStore>,
    options: StoreOptions,
    load_warning: Option<LoadDegraded>,
}

impl SubmissionStore {
    /// Loads the persisted table through `sink`.
    ///
    /// Never fails: absent storage gives an empty table, unusable storage
    /// gives an empty table plus [`SubmissionStore::load_warning`].
    pub fn load(
        questionnaire: Arc<Questionnaire>,
        mut sink: Box<dyn TableSink>,
        blobs: Arc<dyn BlobStore>,
        options: StoreOptions,
    ) -> Self {
        let outcome = sink.load();
        let table = if outcome.table.columns().is_empty() && outcome.table.is_empty() {
            SubmissionTable::for_questionnaire(&questionnaire)
        } else {
            outcome.table
        };

        Self {
            questionnaire,
            table,
            sink,
            blobs,
            options,
            load_warning: outcome.warning,
        }
    }

    /// Store wired from `config`: its backend, photo directory, tuning, and
    /// `default_language`, which becomes the questionnaire's column language.
    pub fn open(questionnaire: Questionnaire, config: &SurveyConfig) -> PersistResult<Self> {
        let questionnaire = questionnaire.with_default_language(&config.default_language);
        Ok(Self::load(
            Arc::new(questionnaire),
            open_sink(config)?,
            Arc::new(DirBlobStore::new(config.photos_path())),
            StoreOptions::from(config),
        ))
    }

    /// Warning raised while loading, if storage was unusable.
    pub fn load_warning(&self) -> Option<&LoadDegraded> {
        self.load_warning.as_ref()
    }

    /// Current table.
    pub fn table(&self) -> &SubmissionTable {
        &self.table
    }

    /// Questionnaire records are labelled with.
    pub fn questionnaire(&self) -> &Arc<Questionnaire> {
        &self.questionnaire
    }

    /// Photo storage.
    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// Fresh editing session for this store's questionnaire.
    pub fn new_session(&self, language: impl Into<LanguageCode>) -> FormSession {
        FormSession::new(Arc::clone(&self.questionnaire), language)
            .with_attachment_policy(self.options.attachment_policy.clone())
    }

    /// Records matching `term`; see [`SubmissionTable::query`].
    pub fn query(&self, term: &str) -> Vec<&SubmissionRecord> {
        self.table.query(term)
    }

    /// Turns a reviewed session into a record, widens the header as needed,
    /// and persists the whole table before returning.
    ///
    /// On failure the in-memory table and the session are left exactly as
    /// they were, so the call can be retried without duplicating data. On
    /// success the session moves to [`Stage::Submitted`].
    pub fn append(&mut self, session: &mut FormSession) -> Result<SubmitOutcome, StoreError> {
        if session.stage() != Stage::PendingReview {
            return Err(StoreError::NotPendingReview(session.stage()));
        }

        let timestamp = self.next_timestamp();
        let surveyor_name = session.surveyor_name().unwrap_or_default();
        let (attached_blob_ref, blob_error) = self.store_blob(session, &surveyor_name, &timestamp);

        let mut order = vec![TIMESTAMP_COLUMN.to_string(), SURVEYOR_COLUMN.to_string()];
        let mut cells = HashMap::new();
        let surveyor_field = self.questionnaire.surveyor_field();
        for (id, value) in session.answers() {
            if surveyor_field == Some(id) {
                continue;
            }
            let rendered = value.render();
            if rendered.is_empty() {
                continue;
            }
            let column = self.questionnaire.label(id, session.language());
            order.push(column.clone());
            cells.insert(column, rendered);
        }
        for (column, value) in session.extras() {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            if cells.contains_key(column.as_str()) {
                tracing::warn!(column = %column, "extra column shadows an answer; dropped");
                continue;
            }
            order.push(column.clone());
            cells.insert(column.clone(), value.to_string());
        }
        if attached_blob_ref.is_some() {
            order.push(PHOTO_COLUMN.to_string());
        }
        order.push(LANGUAGE_COLUMN.to_string());

        let record = SubmissionRecord {
            timestamp,
            surveyor_name,
            language: Some(session.language().to_string()),
            cells,
            attached_blob_ref,
        };

        let (columns_before, records_before) = (self.table.columns().len(), self.table.len());
        let added = self.table.ensure_columns(order);
        if added > 0 {
            tracing::debug!(added, columns = self.table.columns().len(), "widened submission table");
        }
        let index = self.table.push(record.clone());

        if let Err(err) = self.persist_with_retry() {
            self.table.rollback(columns_before, records_before);
            return Err(err);
        }
        session.mark_submitted();

        tracing::info!(
            index,
            surveyor = %record.surveyor_name,
            photo = record.attached_blob_ref.as_deref().unwrap_or("-"),
            "submission appended"
        );
        Ok(SubmitOutcome {
            index,
            record,
            blob_error,
        })
    }

    /// Forces the sink to stable storage.
    pub fn flush(&mut self) -> Result<(), PersistError> {
        self.sink.flush()
    }

    fn persist_with_retry(&mut self) -> Result<(), StoreError> {
        let attempts = self.options.persist_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.sink.persist(&self.table) {
                Ok(()) => return Ok(()),
                Err(source) if attempt >= attempts => {
                    tracing::error!(attempts, error = %source, location = %self.sink.location(), "giving up on persist");
                    return Err(StoreError::Persist { attempts, source });
                }
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "persist failed, retrying");
                    std::thread::sleep(self.options.persist_backoff * attempt);
                    attempt += 1;
                }
            }
        }
    }

    fn store_blob(
        &self,
        session: &FormSession,
        surveyor_name: &str,
        timestamp: &DateTime<Utc>,
    ) -> (Option<String>, Option<BlobWriteFailure>) {
        let Some(blob) = session.attached_blob() else {
            return (None, None);
        };

        let ext = blob.extension().unwrap_or_default();
        let key = photo_key(surveyor_name, timestamp, &ext);
        let stored = unused_key(self.blobs.as_ref(), &key)
            .and_then(|key| self.blobs.put(&key, &blob.bytes).map(|()| key));
        match stored {
            Ok(key) => (Some(key), None),
            Err(source) => {
                tracing::warn!(key = %key, error = %source, "photo not stored, saving record without it");
                (None, Some(BlobWriteFailure { key, source }))
            }
        }
    }

    fn next_timestamp(&self) -> DateTime<Utc> {
        let now = Utc::now().trunc_subsecs(6);
        match self.table.last_timestamp() {
            Some(last) if now <= last => last + TimeDelta::microseconds(1),
            _ => now,
        }
    }
}
