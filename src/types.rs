//! Shared identifiers, language codes, and fixed column names.

/// Stable short identifier of one survey question.
pub type FieldId = String;
/// Display language code such as `"en"` or `"hi"`.
pub type LanguageCode = String;
/// Name of a column in the persisted submission table.
pub type ColumnName = String;

/// Language used when a label has no entry for the requested language.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Column holding the store-assigned creation instant.
pub const TIMESTAMP_COLUMN: &str = "Timestamp";
/// Column holding the surveyor's name.
pub const SURVEYOR_COLUMN: &str = "Surveyor Name";
/// Column holding the stored photo key, if any.
pub const PHOTO_COLUMN: &str = "Photo";
/// Column holding the language the form was filled in.
pub const LANGUAGE_COLUMN: &str = "Language";

/// Lifecycle stage of a form session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Answers are being filled in or edited.
    Editing,
    /// Answers passed validation and await confirmation.
    PendingReview,
    /// Answers were appended to the submission table. Terminal.
    Submitted,
}
