//! Output validation: JSON extraction, schema checks, consistency signals
//! and the fallback policy they feed.

pub mod consistency;
pub mod fallback;
pub mod json;
pub mod schema;

use serde::{Deserialize, Serialize};

pub use consistency::{ConsistencyChecker, ConsistencyResult, ConsistencySignal};
pub use fallback::{
    FallbackAction, FallbackActionKind, FallbackContext, FallbackOrchestrator, FallbackPolicy,
};
pub use json::{Extraction, ExtractionError, JsonExtractor};
pub use schema::{SchemaValidator, ValidationIssue, ValidationResult};

/// The closed set of error kinds that cross component boundaries.
///
/// These are the only failure classifications the fallback policy
/// understands; everything else is treated as terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A JSON candidate was found but did not parse; carries the first
    /// parser message.
    DecodeError(String),
    /// No JSON candidate was found at all.
    NoJsonCandidate,
    /// The schema could not be applied to the payload.
    SchemaFailure,
    /// A required field was absent.
    MissingField,
    /// A field had the wrong type.
    TypeMismatch,
    /// A field value was outside its enumeration.
    EnumMismatch,
    /// A consistency check between context and output failed.
    ConsistencyFailed,
    /// The backend ran out of accelerator memory.
    Oom,
    /// The invocation exceeded its wall-clock budget.
    Timeout,
    /// The transport to the backend failed.
    TransportError,
    /// Anything outside the taxonomy.
    Other(String),
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::DecodeError(message) if message.is_empty() => write!(f, "decode_error"),
            ErrorKind::DecodeError(message) => write!(f, "decode_error:{message}"),
            ErrorKind::NoJsonCandidate => write!(f, "no_json_candidate"),
            ErrorKind::SchemaFailure => write!(f, "schema_failure"),
            ErrorKind::MissingField => write!(f, "missing_field"),
            ErrorKind::TypeMismatch => write!(f, "type_mismatch"),
            ErrorKind::EnumMismatch => write!(f, "enum_mismatch"),
            ErrorKind::ConsistencyFailed => write!(f, "consistency_failed"),
            ErrorKind::Oom => write!(f, "oom"),
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::TransportError => write!(f, "transport_error"),
            ErrorKind::Other(label) => write!(f, "{label}"),
        }
    }
}

impl ErrorKind {
    /// Parses a serialized label back into a kind. Unrecognized labels
    /// become [`ErrorKind::Other`].
    pub fn from_label(label: &str) -> Self {
        if let Some(message) = label.strip_prefix("decode_error") {
            return ErrorKind::DecodeError(message.strip_prefix(':').unwrap_or("").to_string());
        }
        match label {
            "no_json_candidate" => ErrorKind::NoJsonCandidate,
            "schema_failure" => ErrorKind::SchemaFailure,
            "missing_field" => ErrorKind::MissingField,
            "type_mismatch" => ErrorKind::TypeMismatch,
            "enum_mismatch" => ErrorKind::EnumMismatch,
            "consistency_failed" => ErrorKind::ConsistencyFailed,
            "oom" => ErrorKind::Oom,
            "timeout" => ErrorKind::Timeout,
            "transport_error" => ErrorKind::TransportError,
            other => ErrorKind::Other(other.to_string()),
        }
    }
}
