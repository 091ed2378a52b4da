//! Errors raised while composing classes, constructing instances and dispatching events.

use thiserror::Error;

use crate::schema::FieldType;

/// Every failure the engine can report.
///
/// Composition-time variants abort startup; construction-time variants are
/// returned to the caller that asked for the instance and leave registries
/// untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("cannot instantiate abstract class `{class}`: missing {}", .missing.join(", "))]
    AbstractInstantiation { class: String, missing: Vec<String> },

    #[error("class `{class}` references unknown event `{event}`")]
    UnknownEvent { class: String, event: String },

    #[error(
        "fields supplied to `{class}` do not match its schema (missing: [{}], unexpected: [{}])",
        .missing.join(", "),
        .unexpected.join(", ")
    )]
    SchemaMismatch {
        class: String,
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("field `{field}` of `{class}` expects {expected}, got {found}")]
    FieldTypeMismatch {
        class: String,
        field: String,
        expected: FieldType,
        found: FieldType,
    },

    #[error("field `{field}` supplied to `{class}` more than once")]
    DuplicateField { class: String, field: String },

    #[error("class `{class}` has no field `{field}`")]
    UnknownField { class: String, field: String },

    #[error("field `{field}` of `{class}` is frozen")]
    FrozenRecord { class: String, field: String },

    #[error("family `{family}` already has a class named `{name}`")]
    DuplicateRegistration { family: String, name: String },

    #[error("event `{event}` in `{class}` is declared by both `{first}` and `{second}`")]
    DuplicateEvent {
        class: String,
        event: String,
        first: String,
        second: String,
    },

    #[error("event `{event}` in `{class}` has sampling rate {rate} outside [0, 1]")]
    InvalidSamplingRate {
        class: String,
        event: String,
        rate: f64,
    },

    #[error(
        "event `{event}` of `{class}` takes ({}), got ({})",
        type_list(.expected),
        type_list(.found)
    )]
    ArgumentMismatch {
        class: String,
        event: String,
        expected: Vec<FieldType>,
        found: Vec<FieldType>,
    },

    #[error(
        "class `{class}` extends [{}] but was composed with [{}]",
        .declared.join(", "),
        .supplied.join(", ")
    )]
    BaseMismatch {
        class: String,
        declared: Vec<String>,
        supplied: Vec<String>,
    },

    #[error("bases of `{class}` have no consistent linearization")]
    InconsistentHierarchy { class: String },

    #[error("family `{family}` has no class named `{name}`")]
    UnknownClass { family: String, name: String },

    #[error("class `{class}` does not provide capability `{capability}`")]
    MissingCapability { class: String, capability: String },
}

fn type_list(types: &[FieldType]) -> String {
    types
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result alias used throughout the engine.
pub type EngineResult<T> = Result<T, EngineError>;
