//! Static questionnaire schema: field descriptions and label lookup.

/// Built-in cotton-farming questionnaire.
pub mod catalog;
/// Ordered, read-only questionnaire with label fallback.
pub mod model;
/// Field descriptions and kinds.
pub mod spec;

pub use model::{Questionnaire, QuestionnaireError};
pub use spec::{FieldKind, FieldSpec, TextRule};
