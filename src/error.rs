use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::parser::Position;
use crate::types::EntityUid;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{position}: {message}")]
pub struct LexError {
    pub position: Position,
    pub message: String,
}

impl LexError {
    pub fn new(position: Position, message: impl Into<String>) -> Self {
        LexError {
            position,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{position}: {message}")]
pub struct ParseError {
    pub position: Position,
    pub message: String,
}

impl ParseError {
    pub fn new(position: Position, message: impl Into<String>) -> Self {
        ParseError {
            position,
            message: message.into(),
        }
    }
}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        ParseError {
            position: err.position,
            message: err.message,
        }
    }
}

/// Failure while evaluating a single policy against a request.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum EvalError {
    #[error("type error: expected {expected}, got {actual}")]
    TypeError { expected: String, actual: String },

    #[error("`{receiver}` does not have the attribute `{attr}`")]
    AttributeNotFound { receiver: String, attr: String },

    #[error("`{entity}` does not have the tag `{tag}`")]
    TagNotFound { entity: EntityUid, tag: String },

    #[error("entity `{0}` does not exist")]
    EntityNotFound(EntityUid),

    #[error("cannot access attributes of an unspecified entity")]
    UnspecifiedEntity,

    #[error("integer overflow while attempting to {op} the values {left} and {right}")]
    Overflow {
        op: String,
        left: String,
        right: String,
    },

    #[error("integer overflow while attempting to negate {0}")]
    NegationOverflow(i64),

    #[error("unknown extension function `{0}`")]
    UnknownExtension(String),

    #[error("wrong number of arguments to `{name}`: expected {expected}, got {got}")]
    ExtensionArity {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("error in extension function `{name}`: {message}")]
    ExtensionValue { name: String, message: String },
}

impl EvalError {
    pub(crate) fn type_error(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        EvalError::TypeError {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub(crate) fn overflow(op: &str, left: impl ToString, right: impl ToString) -> Self {
        EvalError::Overflow {
            op: op.to_string(),
            left: left.to_string(),
            right: right.to_string(),
        }
    }

    pub(crate) fn extension(name: &str, message: impl Into<String>) -> Self {
        EvalError::ExtensionValue {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error, Serialize, Deserialize)]
pub enum PolicyError {
    #[error("failed to tokenize policy: {0}")]
    Lex(#[from] LexError),

    #[error("failed to parse policy: {0}")]
    Parse(#[from] ParseError),

    #[error("invalid policy JSON: {0}")]
    Json(String),

    #[error("duplicate policy id: {0}")]
    DuplicatePolicyId(String),

    #[error("Entity error: {0}")]
    EntityError(String),

    #[error("Poisoned lock error: {0}")]
    PoisonedLockError(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

impl From<serde_json::Error> for PolicyError {
    fn from(err: serde_json::Error) -> Self {
        PolicyError::Json(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for PolicyError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        PolicyError::PoisonedLockError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display_has_location() {
        let err = ParseError::new(
            Position {
                offset: 10,
                line: 2,
                column: 4,
            },
            "expected `;`, got end of input",
        );
        assert_eq!(err.to_string(), "2:4: expected `;`, got end of input");
    }

    #[test]
    fn test_lex_error_converts_to_policy_error() {
        let err: PolicyError = LexError::new(Position::default(), "string literal not terminated").into();
        assert!(matches!(err, PolicyError::Lex(_)));
        assert!(err.to_string().contains("1:1"));
    }

    #[test]
    fn test_overflow_message_names_operands() {
        let err = EvalError::overflow("add", i64::MAX, 1);
        assert_eq!(
            err.to_string(),
            "integer overflow while attempting to add the values 9223372036854775807 and 1"
        );
    }

    #[test]
    fn test_eval_error_serialization() {
        let err = EvalError::AttributeNotFound {
            receiver: r#"User::"a""#.to_string(),
            attr: "age".to_string(),
        };
        let json = serde_json::to_value(&err).unwrap();
        let back: EvalError = serde_json::from_value(json).unwrap();
        assert_eq!(err, back);
    }
}
