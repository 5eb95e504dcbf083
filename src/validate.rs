//! Submit-time validation of raw answers against the questionnaire.

use serde::{Deserialize, Serialize};

use crate::{
    questionnaire::{FieldKind, FieldSpec, Questionnaire, TextRule},
    session::AnswerValue,
    types::FieldId,
};

/// Category of a field-level validation problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidationErrorKind {
    /// Required answer absent, blank, or a disallowed zero.
    Missing,
    /// Answer cannot be read as the field's type.
    WrongType,
    /// Answer has the right type but an unacceptable value.
    OutOfRange,
    /// Text does not have the required shape.
    PatternMismatch,
}

/// One problem with one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Offending field.
    pub field_id: FieldId,
    /// Problem category.
    pub kind: ValidationErrorKind,
    /// Human-readable explanation using the field's canonical label.
    pub message: String,
}

/// Checks every field of `questionnaire` and collects all problems, in field
/// declaration order, at most one per field.
///
/// `lookup` returns the stored raw answer for a field id. Validation never
/// mutates anything, so repeated calls on the same answers agree.
pub fn validate<'a, F>(questionnaire: &Questionnaire, lookup: F) -> Vec<ValidationError>
where
    F: Fn(&str) -> Option<&'a AnswerValue>,
{
    questionnaire
        .field_specs()
        .iter()
        .filter_map(|field| {
            let label = questionnaire.canonical_label(&field.id);
            check_field(field, &label, lookup(&field.id)).map(|(kind, message)| ValidationError {
                field_id: field.id.clone(),
                kind,
                message,
            })
        })
        .collect()
}

type Problem = (ValidationErrorKind, String);

fn check_field(field: &FieldSpec, label: &str, value: Option<&AnswerValue>) -> Option<Problem> {
    let Some(value) = value.filter(|v| !v.is_blank()) else {
        return field
            .required
            .then(|| missing(format!("{label} is required")));
    };

    match &field.kind {
        FieldKind::Text => None,
        FieldKind::Number { zero_is_missing } => {
            let Some(number) = parse_number(value) else {
                return Some(wrong_type(format!("{label} must be a number")));
            };
            if number < 0.0 {
                return Some((
                    ValidationErrorKind::OutOfRange,
                    format!("{label} cannot be negative"),
                ));
            }
            if number == 0.0 && *zero_is_missing && field.required {
                return Some(missing(format!("{label} must be greater than zero")));
            }
            None
        }
        FieldKind::SingleChoice(options) => {
            let choice = match value {
                AnswerValue::Text(text) => text.as_str(),
                AnswerValue::Choices(items) if items.len() == 1 => items[0].as_str(),
                AnswerValue::Choices(_) => {
                    return Some(wrong_type(format!("{label} takes a single option")));
                }
            };
            check_option(options, label, choice)
        }
        FieldKind::MultiChoice(options) => match value {
            AnswerValue::Choices(items) => items
                .iter()
                .filter(|item| !item.trim().is_empty())
                .find_map(|item| check_option(options, label, item)),
            AnswerValue::Text(_) => Some(wrong_type(format!("{label} takes a list of options"))),
        },
        FieldKind::YesNo => match value {
            AnswerValue::Text(text) if parse_yes_no(text).is_some() => None,
            _ => Some(wrong_type(format!("{label} must be Yes or No"))),
        },
        FieldKind::ConstrainedText(rule) => match value {
            AnswerValue::Text(text) => check_rule(rule, label, text),
            AnswerValue::Choices(_) => Some(wrong_type(format!("{label} must be text"))),
        },
    }
}

fn check_option(options: &[String], label: &str, choice: &str) -> Option<Problem> {
    let choice = choice.trim();
    if options.iter().any(|o| o.eq_ignore_ascii_case(choice)) {
        return None;
    }
    Some((
        ValidationErrorKind::OutOfRange,
        format!("`{choice}` is not an option for {label}"),
    ))
}

fn check_rule(rule: &TextRule, label: &str, text: &str) -> Option<Problem> {
    let text = text.trim();
    match rule {
        TextRule::Digits(len) => {
            let ok = text.len() == *len && text.bytes().all(|b| b.is_ascii_digit());
            (!ok).then(|| {
                (
                    ValidationErrorKind::PatternMismatch,
                    format!("{label} must be exactly {len} digits"),
                )
            })
        }
        TextRule::Segments { count, separator } => {
            let parts: Vec<&str> = text.split(*separator).map(str::trim).collect();
            let ok = parts.len() == *count && parts.iter().all(|p| !p.is_empty());
            (!ok).then(|| {
                (
                    ValidationErrorKind::PatternMismatch,
                    format!("{label} needs exactly {count} entries separated by `{separator}`"),
                )
            })
        }
    }
}

/// Reads a numeric answer; `None` for non-numeric or non-finite input.
pub fn parse_number(value: &AnswerValue) -> Option<f64> {
    let AnswerValue::Text(text) = value else {
        return None;
    };
    text.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Reads a yes/no answer, accepting `yes`, `no`, `y` and `n` in any case.
pub fn parse_yes_no(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "yes" | "y" => Some(true),
        "no" | "n" => Some(false),
        _ => None,
    }
}

fn missing(message: String) -> Problem {
    (ValidationErrorKind::Missing, message)
}

fn wrong_type(message: String) -> Problem {
    (ValidationErrorKind::WrongType, message)
}
