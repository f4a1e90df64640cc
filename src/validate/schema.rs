//! Draft-07 schema validation with classified issues.
//!
//! Each failing keyword is mapped to one of the boundary-crossing issue
//! types so the fallback policy can act on it without inspecting messages.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use jsonschema::error::ValidationErrorKind;
use jsonschema::{Draft, Validator};

use super::ErrorKind;

/// Errors raised while preparing a validator.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Schema failed to compile: {0}")]
    Compile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Schema file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Classification of one schema violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    MissingField,
    TypeMismatch,
    EnumMismatch,
    ValidationError,
}

/// A single reported schema violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub message: String,
    /// Instance path with segments joined by `.`; empty at the root.
    pub path: String,
    pub issue_type: IssueType,
}

/// Outcome of validating one payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Maps the first issue to the boundary error kind, if any.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.issues.first().map(|issue| match issue.issue_type {
            IssueType::MissingField => ErrorKind::MissingField,
            IssueType::TypeMismatch => ErrorKind::TypeMismatch,
            IssueType::EnumMismatch => ErrorKind::EnumMismatch,
            IssueType::ValidationError => ErrorKind::SchemaFailure,
        })
    }
}

/// Validates payloads against a draft-07 JSON schema.
pub struct SchemaValidator {
    validator: Validator,
}

impl SchemaValidator {
    /// Compiles a validator from an in-memory schema.
    pub fn new(schema: &serde_json::Value) -> Result<Self, SchemaError> {
        let validator = jsonschema::options()
            .with_draft(Draft::Draft7)
            .build(schema)
            .map_err(|err| SchemaError::Compile(err.to_string()))?;
        Ok(Self { validator })
    }

    /// Reads and compiles a schema file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, SchemaError> {
        let raw = std::fs::read_to_string(path)?;
        let schema: serde_json::Value = serde_json::from_str(&raw)?;
        Self::new(&schema)
    }

    /// Validates a payload, returning every classified issue.
    pub fn validate(&self, payload: &serde_json::Value) -> ValidationResult {
        let issues: Vec<ValidationIssue> = self
            .validator
            .iter_errors(payload)
            .map(|error| ValidationIssue {
                message: error.to_string(),
                path: Self::dotted_path(&error.instance_path.to_string()),
                issue_type: Self::classify(&error.kind),
            })
            .collect();

        ValidationResult {
            valid: issues.is_empty(),
            issues,
        }
    }

    fn classify(kind: &ValidationErrorKind) -> IssueType {
        match kind {
            ValidationErrorKind::Required { .. } => IssueType::MissingField,
            ValidationErrorKind::Type { .. } => IssueType::TypeMismatch,
            ValidationErrorKind::Enum { .. } => IssueType::EnumMismatch,
            _ => IssueType::ValidationError,
        }
    }

    fn dotted_path(pointer: &str) -> String {
        pointer.trim_start_matches('/').replace('/', ".")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn person_schema() -> serde_json::Value {
        json!({
            "type": "object",
            "required": ["name", "age"],
            "properties": {
                "name": {"type": "string"},
                "age": {"type": "integer"},
                "status": {"enum": ["active", "inactive"]},
                "address": {
                    "type": "object",
                    "properties": {"zip": {"type": "string"}}
                }
            }
        })
    }

    #[test]
    fn test_valid_payload_has_no_issues() {
        let validator = SchemaValidator::new(&person_schema()).expect("compiles");
        let result = validator.validate(&json!({"name": "x", "age": 30}));
        assert!(result.valid);
        assert!(result.issues.is_empty());
        assert_eq!(result.error_kind(), None);
    }

    #[test]
    fn test_missing_required_field() {
        let validator = SchemaValidator::new(&person_schema()).expect("compiles");
        let result = validator.validate(&json!({"name": "x"}));
        assert!(!result.valid);
        let issue = &result.issues[0];
        assert_eq!(issue.issue_type, IssueType::MissingField);
        assert_eq!(issue.path, "");
        assert_eq!(result.error_kind(), Some(ErrorKind::MissingField));
    }

    #[test]
    fn test_type_mismatch_has_dotted_path() {
        let validator = SchemaValidator::new(&person_schema()).expect("compiles");
        let result = validator.validate(&json!({"name": "x", "age": "thirty"}));
        assert!(!result.valid);
        let issue = result
            .issues
            .iter()
            .find(|i| i.issue_type == IssueType::TypeMismatch)
            .expect("type issue reported");
        assert_eq!(issue.path, "age");
    }

    #[test]
    fn test_nested_path_joins_with_dots() {
        let validator = SchemaValidator::new(&person_schema()).expect("compiles");
        let result = validator.validate(&json!({
            "name": "x",
            "age": 1,
            "address": {"zip": 12345}
        }));
        let issue = result
            .issues
            .iter()
            .find(|i| i.issue_type == IssueType::TypeMismatch)
            .expect("type issue reported");
        assert_eq!(issue.path, "address.zip");
    }

    #[test]
    fn test_enum_mismatch_classification() {
        let validator = SchemaValidator::new(&person_schema()).expect("compiles");
        let result = validator.validate(&json!({
            "name": "x",
            "age": 1,
            "status": "dormant"
        }));
        let issue = result
            .issues
            .iter()
            .find(|i| i.issue_type == IssueType::EnumMismatch)
            .expect("enum issue reported");
        assert_eq!(issue.path, "status");
        assert_eq!(result.error_kind(), Some(ErrorKind::EnumMismatch));
    }

    #[test]
    fn test_issue_type_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&IssueType::MissingField).expect("serializes"),
            "\"missing_field\""
        );
    }
}
