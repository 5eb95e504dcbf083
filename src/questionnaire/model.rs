use hashbrown::HashMap;

use crate::types::{DEFAULT_LANGUAGE, FieldId, LanguageCode};

use super::spec::{FieldKind, FieldSpec};

/// Errors raised while assembling a [`Questionnaire`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuestionnaireError {
    /// Two fields share an id.
    #[error("duplicate field id `{0}`")]
    DuplicateField(FieldId),
    /// No fields were supplied.
    #[error("questionnaire has no fields")]
    EmptyQuestionnaire,
    /// The designated surveyor field is not part of the questionnaire.
    #[error("surveyor field `{0}` is not defined")]
    UnknownSurveyorField(FieldId),
}

/// Ordered, immutable set of [`FieldSpec`]s.
#[derive(Debug, Clone)]
pub struct Questionnaire {
    fields: Vec<FieldSpec>,
    pos: HashMap<FieldId, usize>,
    default_language: LanguageCode,
    surveyor_field: Option<FieldId>,
}

impl Questionnaire {
    /// Builds a questionnaire from fields in display order.
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self, QuestionnaireError> {
        if fields.is_empty() {
            return Err(QuestionnaireError::EmptyQuestionnaire);
        }

        let mut pos = HashMap::with_capacity(fields.len());
        for (idx, field) in fields.iter().enumerate() {
            if pos.insert(field.id.clone(), idx).is_some() {
                return Err(QuestionnaireError::DuplicateField(field.id.clone()));
            }
        }

        Ok(Self {
            fields,
            pos,
            default_language: DEFAULT_LANGUAGE.to_string(),
            surveyor_field: None,
        })
    }

    /// Sets the language whose labels are canonical and used as fallback.
    pub fn with_default_language(mut self, language: impl Into<LanguageCode>) -> Self {
        self.default_language = language.into();
        self
    }

    /// Designates the field whose answer is the surveyor's name.
    pub fn with_surveyor_field(mut self, id: impl Into<FieldId>) -> Result<Self, QuestionnaireError> {
        let id = id.into();
        if !self.pos.contains_key(&id) {
            return Err(QuestionnaireError::UnknownSurveyorField(id));
        }
        self.surveyor_field = Some(id);
        Ok(self)
    }

    /// All fields in declaration order.
    pub fn field_specs(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Looks up a field by id.
    pub fn field(&self, id: &str) -> Option<&FieldSpec> {
        self.pos.get(id).map(|idx| &self.fields[*idx])
    }

    /// Returns true when `id` names a field.
    pub fn contains(&self, id: &str) -> bool {
        self.pos.contains_key(id)
    }

    /// Canonical language.
    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    /// Field holding the surveyor's name, if designated.
    pub fn surveyor_field(&self) -> Option<&str> {
        self.surveyor_field.as_deref()
    }

    /// Display label for `id` in `language`.
    ///
    /// Falls back to the default language, then to `"Question <id>"`.
    /// Never returns an empty string.
    pub fn label(&self, id: &str, language: &str) -> String {
        let Some(field) = self.field(id) else {
            return fallback_label(id);
        };

        [language, self.default_language.as_str()]
            .iter()
            .filter_map(|lang| field.labels.get(*lang))
            .map(|text| text.trim())
            .find(|text| !text.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| fallback_label(id))
    }

    /// Label in the default language; used as the persisted column name.
    pub fn canonical_label(&self, id: &str) -> String {
        self.label(id, &self.default_language)
    }

    /// Returns true when `column` can name a question's column in some
    /// language, including the `"Question <id>"` fallback.
    pub fn is_question_column(&self, column: &str) -> bool {
        let column = column.trim();
        self.fields.iter().any(|field| {
            field.labels.values().any(|text| text.trim() == column)
                || fallback_label(&field.id) == column
        })
    }

    /// Answer type of `id`.
    ///
    /// # Panics
    ///
    /// Panics when `id` is not part of the questionnaire; asking for an
    /// unknown field is a caller bug.
    pub fn kind(&self, id: &str) -> &FieldKind {
        &self.expect_field(id).kind
    }

    /// Whether `id` must be answered.
    ///
    /// # Panics
    ///
    /// Panics when `id` is not part of the questionnaire.
    pub fn required(&self, id: &str) -> bool {
        self.expect_field(id).required
    }

    /// Canonical labels of every question column, surveyor field excluded.
    pub fn question_columns(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| self.surveyor_field.as_deref() != Some(f.id.as_str()))
            .map(|f| self.canonical_label(&f.id))
            .collect()
    }

    fn expect_field(&self, id: &str) -> &FieldSpec {
        match self.field(id) {
            Some(field) => field,
            None => panic!("unknown field id `{id}`"),
        }
    }
}

fn fallback_label(id: &str) -> String {
    format!("Question {id}")
}
