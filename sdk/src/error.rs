use brine_wire_compiler::SchemaError;
use brine_wire_schema::WireError;
use thiserror::Error;

/// Errors raised by flyweights and builders.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlyweightError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("flyweight is not wrapped around a buffer")]
    NotWrapped,

    #[error("no declaration named {0}")]
    UnknownDeclaration(String),

    #[error("{decl} has no field named {field}")]
    UnknownField { decl: String, field: String },

    #[error("field {0} is already set")]
    AlreadySet(String),

    #[error("required field {0} is not set")]
    RequiredFieldNotSet(String),

    #[error("field {field} needs limit {limit}, max limit is {max_limit}")]
    OutOfBounds {
        field:     String,
        limit:     usize,
        max_limit: usize,
    },

    #[error("field {0} is a size field and is written with its dependent")]
    SizeField(String),

    #[error("field {field} expects {expected}")]
    TypeMismatch { field: String, expected: &'static str },

    #[error("no case of {decl} matches the value of {field}")]
    UnknownCase { decl: String, field: String },
}

impl FlyweightError {
    pub(crate) fn mismatch(field: &str, expected: &'static str) -> FlyweightError {
        FlyweightError::TypeMismatch {
            field: field.to_string(),
            expected,
        }
    }

    pub(crate) fn unknown_case(decl: &str, field: &str) -> FlyweightError {
        FlyweightError::UnknownCase {
            decl:  decl.to_string(),
            field: field.to_string(),
        }
    }
}

/// Everything that can go wrong between schema text and wire bytes.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Flyweight(#[from] FlyweightError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<WireError> for Error {
    fn from(err: WireError) -> Error {
        Error::Flyweight(FlyweightError::Wire(err))
    }
}
