//! In-progress form state and its lifecycle.

use std::fmt;
use std::sync::Arc;

use hashbrown::HashMap;

use crate::{
    questionnaire::Questionnaire,
    types::{
        FieldId, LANGUAGE_COLUMN, LanguageCode, PHOTO_COLUMN, SURVEYOR_COLUMN, Stage,
        TIMESTAMP_COLUMN,
    },
    validate::{ValidationError, validate},
};

const FIXED_COLUMNS: [&str; 4] = [TIMESTAMP_COLUMN, SURVEYOR_COLUMN, PHOTO_COLUMN, LANGUAGE_COLUMN];

/// Errors raised while editing a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The field id is not part of the questionnaire. A caller bug.
    #[error("unknown field `{0}`")]
    UnknownField(FieldId),
    /// The attachment's extension is not on the allow-list.
    #[error("attachment `{name}` rejected; allowed extensions: {allowed:?}")]
    AttachmentRejected {
        /// Offered file name.
        name: String,
        /// Configured allow-list.
        allowed: Vec<String>,
    },
    /// Answers can only change while the session is being edited.
    #[error("session is not editable in stage {0:?}")]
    NotEditing(Stage),
    /// Extra columns must be non-blank and must not shadow a fixed or
    /// question column.
    #[error("`{0}` cannot be used as an extra column")]
    ReservedColumn(String),
}

/// Raw answer exactly as entered; coerced only at validation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerValue {
    /// Typed or selected text.
    Text(String),
    /// Selected options of a multi-choice question.
    Choices(Vec<String>),
}

impl AnswerValue {
    /// True for whitespace-only text or an empty selection.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().is_empty(),
            Self::Choices(items) => items.iter().all(|item| item.trim().is_empty()),
        }
    }

    /// Cell rendering used in the persisted table.
    pub fn render(&self) -> String {
        match self {
            Self::Text(text) => text.trim().to_string(),
            Self::Choices(items) => items
                .iter()
                .map(|item| item.trim())
                .filter(|item| !item.is_empty())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

impl From<&str> for AnswerValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AnswerValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<String>> for AnswerValue {
    fn from(value: Vec<String>) -> Self {
        Self::Choices(value)
    }
}

impl From<Vec<&str>> for AnswerValue {
    fn from(value: Vec<&str>) -> Self {
        Self::Choices(value.into_iter().map(str::to_string).collect())
    }
}

/// Uploaded file waiting to be stored alongside the record.
#[derive(Clone, PartialEq, Eq)]
pub struct AttachedBlob {
    /// Original file name.
    pub name: String,
    /// File content.
    pub bytes: Vec<u8>,
    /// MIME type reported by the uploader.
    pub content_type: String,
}

impl AttachedBlob {
    /// Lower-cased extension of `name`, if any.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.name)
    }
}

impl fmt::Debug for AttachedBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachedBlob")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// Which attachments a session accepts. An empty list accepts any file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPolicy {
    /// Lower-case extensions without the dot.
    pub allowed_extensions: Vec<String>,
}

impl Default for AttachmentPolicy {
    fn default() -> Self {
        Self {
            allowed_extensions: vec!["jpg".into(), "jpeg".into(), "png".into()],
        }
    }
}

impl AttachmentPolicy {
    /// Returns true when a file called `name` may be attached.
    pub fn accepts(&self, name: &str) -> bool {
        if self.allowed_extensions.is_empty() {
            return true;
        }
        extension_of(name).is_some_and(|ext| {
            self.allowed_extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(&ext))
        })
    }
}

/// One user's in-progress submission.
///
/// Created empty, edited field by field, validated by [`FormSession::advance`],
/// and finally consumed by the submission store. A submitted session is not
/// reused.
#[derive(Debug, Clone)]
pub struct FormSession {
    questionnaire: Arc<Questionnaire>,
    policy: AttachmentPolicy,
    language: LanguageCode,
    answers: HashMap<FieldId, AnswerValue>,
    extras: Vec<(String, String)>,
    attached_blob: Option<AttachedBlob>,
    stage: Stage,
}

impl FormSession {
    /// Starts an empty session displayed in `language`.
    pub fn new(questionnaire: Arc<Questionnaire>, language: impl Into<LanguageCode>) -> Self {
        Self {
            questionnaire,
            policy: AttachmentPolicy::default(),
            language: language.into(),
            answers: HashMap::new(),
            extras: Vec::new(),
            attached_blob: None,
            stage: Stage::Editing,
        }
    }

    /// Replaces the attachment allow-list.
    pub fn with_attachment_policy(mut self, policy: AttachmentPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Questionnaire this session answers.
    pub fn questionnaire(&self) -> &Questionnaire {
        &self.questionnaire
    }

    /// Display language, fixed for the life of the session.
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Current lifecycle stage.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Stored answer for `id`.
    pub fn answer(&self, id: &str) -> Option<&AnswerValue> {
        self.answers.get(id)
    }

    /// Answers in questionnaire order.
    pub fn answers(&self) -> impl Iterator<Item = (&str, &AnswerValue)> {
        self.questionnaire
            .field_specs()
            .iter()
            .filter_map(|f| self.answers.get(&f.id).map(|v| (f.id.as_str(), v)))
    }

    /// Ad hoc extra columns in insertion order.
    pub fn extras(&self) -> &[(String, String)] {
        &self.extras
    }

    /// Attached file, if any.
    pub fn attached_blob(&self) -> Option<&AttachedBlob> {
        self.attached_blob.as_ref()
    }

    /// Stores `value` for `id` exactly as given.
    pub fn set_answer(
        &mut self,
        id: &str,
        value: impl Into<AnswerValue>,
    ) -> Result<(), SessionError> {
        self.ensure_editing()?;
        if !self.questionnaire.contains(id) {
            return Err(SessionError::UnknownField(id.to_string()));
        }
        self.answers.insert(id.to_string(), value.into());
        Ok(())
    }

    /// Removes the answer for `id`.
    pub fn clear_answer(&mut self, id: &str) -> Result<Option<AnswerValue>, SessionError> {
        self.ensure_editing()?;
        if !self.questionnaire.contains(id) {
            return Err(SessionError::UnknownField(id.to_string()));
        }
        Ok(self.answers.remove(id))
    }

    /// Sets an ad hoc column such as a free-text "other" specification.
    ///
    /// The name is trimmed. Blank names, the fixed columns, and any
    /// question label in any language are rejected.
    pub fn set_extra(
        &mut self,
        column: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.ensure_editing()?;
        let column = column.into().trim().to_string();
        if column.is_empty()
            || FIXED_COLUMNS.contains(&column.as_str())
            || self.questionnaire.is_question_column(&column)
        {
            return Err(SessionError::ReservedColumn(column));
        }
        let value = value.into();
        match self.extras.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = value,
            None => self.extras.push((column, value)),
        }
        Ok(())
    }

    /// Attaches a file, replacing any earlier one.
    pub fn attach_blob(
        &mut self,
        name: impl Into<String>,
        bytes: Vec<u8>,
        content_type: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.ensure_editing()?;
        let name = name.into();
        if !self.policy.accepts(&name) {
            return Err(SessionError::AttachmentRejected {
                name,
                allowed: self.policy.allowed_extensions.clone(),
            });
        }
        self.attached_blob = Some(AttachedBlob {
            name,
            bytes,
            content_type: content_type.into(),
        });
        Ok(())
    }

    /// Drops the attached file.
    pub fn detach_blob(&mut self) -> Option<AttachedBlob> {
        self.attached_blob.take()
    }

    /// Checks every field and returns all problems found.
    pub fn validate(&self) -> Vec<ValidationError> {
        validate(&self.questionnaire, |id| self.answers.get(id))
    }

    /// Moves `Editing` to `PendingReview` when validation passes.
    ///
    /// On failure the stage is left untouched and every error is returned.
    /// A session that is already past editing is only re-validated.
    pub fn advance(&mut self) -> Result<(), Vec<ValidationError>> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(errors);
        }
        if self.stage == Stage::Editing {
            self.stage = Stage::PendingReview;
        }
        Ok(())
    }

    /// Moves `PendingReview` back to `Editing`, keeping every answer.
    ///
    /// Returns false when the session was not pending review.
    pub fn revert(&mut self) -> bool {
        if self.stage != Stage::PendingReview {
            return false;
        }
        self.stage = Stage::Editing;
        true
    }

    /// Trimmed answer of the designated surveyor field.
    pub fn surveyor_name(&self) -> Option<String> {
        let id = self.questionnaire.surveyor_field()?;
        self.answers
            .get(id)
            .map(AnswerValue::render)
            .filter(|name| !name.is_empty())
    }

    pub(crate) fn mark_submitted(&mut self) {
        self.stage = Stage::Submitted;
    }

    fn ensure_editing(&self) -> Result<(), SessionError> {
        if self.stage != Stage::Editing {
            return Err(SessionError::NotEditing(self.stage));
        }
        Ok(())
    }
}

fn extension_of(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_matches_extension_case_insensitively() {
        let policy = AttachmentPolicy::default();
        assert!(policy.accepts("field.JPG"));
        assert!(policy.accepts("a.b.png"));
        assert!(!policy.accepts("notes.pdf"));
        assert!(!policy.accepts("jpg"));
        assert!(!policy.accepts(".png"));

        let open = AttachmentPolicy {
            allowed_extensions: vec![],
        };
        assert!(open.accepts("anything"));
    }

    #[test]
    fn choices_render_joined_and_trimmed() {
        let v = AnswerValue::from(vec![" Urea", "", "DAP "]);
        assert_eq!(v.render(), "Urea, DAP");
        assert!(AnswerValue::from("  ").is_blank());
        assert!(AnswerValue::Choices(vec![]).is_blank());
    }
}
