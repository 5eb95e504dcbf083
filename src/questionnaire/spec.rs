use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{FieldId, LanguageCode};

/// Rule applied to a [`FieldKind::ConstrainedText`] answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextRule {
    /// Exactly this many ASCII digits and nothing else.
    Digits(usize),
    /// Exactly `count` non-empty segments after splitting on `separator`
    /// and trimming whitespace.
    Segments {
        /// Required segment count.
        count: usize,
        /// Segment separator.
        separator: char,
    },
}

/// Answer type of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Free text.
    Text,
    /// Non-negative real number.
    Number {
        /// A required answer of exactly zero counts as missing.
        zero_is_missing: bool,
    },
    /// Exactly one of the listed options.
    SingleChoice(Vec<String>),
    /// Any subset of the listed options.
    MultiChoice(Vec<String>),
    /// Yes or no.
    YesNo,
    /// Free text checked against a [`TextRule`].
    ConstrainedText(TextRule),
}

/// Static description of one survey question.
///
/// Built once at startup and never mutated afterwards. An `id` that has been
/// written to any stored record must never be reused for another question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Stable identifier.
    pub id: FieldId,
    /// Answer type.
    pub kind: FieldKind,
    /// Whether an answer must be supplied.
    pub required: bool,
    /// Display label per language code.
    pub labels: BTreeMap<LanguageCode, String>,
}

impl FieldSpec {
    /// Creates an optional field of `kind` with no labels.
    pub fn new(id: impl Into<FieldId>, kind: FieldKind) -> Self {
        Self {
            id: id.into(),
            kind,
            required: false,
            labels: BTreeMap::new(),
        }
    }

    /// Free-text field.
    pub fn text(id: impl Into<FieldId>) -> Self {
        Self::new(id, FieldKind::Text)
    }

    /// Numeric field where zero is an ordinary answer.
    pub fn number(id: impl Into<FieldId>) -> Self {
        Self::new(
            id,
            FieldKind::Number {
                zero_is_missing: false,
            },
        )
    }

    /// Numeric field where a required zero counts as missing
    /// (income, yield, price and quantity questions).
    pub fn amount(id: impl Into<FieldId>) -> Self {
        Self::new(
            id,
            FieldKind::Number {
                zero_is_missing: true,
            },
        )
    }

    /// Single-choice field over `options`.
    pub fn single_choice<I, S>(id: impl Into<FieldId>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            id,
            FieldKind::SingleChoice(options.into_iter().map(Into::into).collect()),
        )
    }

    /// Multi-choice field over `options`.
    pub fn multi_choice<I, S>(id: impl Into<FieldId>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            id,
            FieldKind::MultiChoice(options.into_iter().map(Into::into).collect()),
        )
    }

    /// Yes/no field.
    pub fn yes_no(id: impl Into<FieldId>) -> Self {
        Self::new(id, FieldKind::YesNo)
    }

    /// Text field that must be exactly `len` digits.
    pub fn digits(id: impl Into<FieldId>, len: usize) -> Self {
        Self::new(id, FieldKind::ConstrainedText(TextRule::Digits(len)))
    }

    /// Text field that must hold exactly `count` comma-separated parts.
    pub fn comma_parts(id: impl Into<FieldId>, count: usize) -> Self {
        Self::new(
            id,
            FieldKind::ConstrainedText(TextRule::Segments {
                count,
                separator: ',',
            }),
        )
    }

    /// Marks the field as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Adds or replaces the label for `language`.
    pub fn label(mut self, language: impl Into<LanguageCode>, text: impl Into<String>) -> Self {
        self.labels.insert(language.into(), text.into());
        self
    }

    /// Returns true when a required zero answer must be reported as missing.
    pub fn zero_is_missing(&self) -> bool {
        matches!(
            self.kind,
            FieldKind::Number {
                zero_is_missing: true
            }
        )
    }
}
