//! Runtime event stream payloads.

/// Events emitted from the single-writer runtime loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurveyEvent {
    /// A submission was appended and persisted.
    Appended {
        /// Position of the new record.
        index: usize,
    },
    /// A submission's photo could not be stored; the record was kept.
    BlobFailed {
        /// Key the photo was meant to have.
        key: String,
    },
    /// A submission could not be persisted and was dropped.
    PersistFailed {
        /// Attempts made before giving up.
        attempts: u32,
    },
}
