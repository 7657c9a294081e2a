use thiserror::Error;

/// Schema validation failures. Every variant names the declaration and,
/// where one is involved, the field at fault.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at line {line}, column {column}: {msg}")]
    ParseError {
        msg:    String,
        line:   usize,
        column: usize,
    },

    #[error("Reference not found: {token} (in {decl})")]
    ReferenceNotFound {
        decl:  String,
        token: String,
    },

    #[error("Duplicate name {name} in {scope}")]
    Duplicate {
        scope: String,
        name:  String,
    },

    #[error("Invalid size field for {decl}.{field}: {msg}")]
    InvalidSizeField {
        decl:  String,
        field: String,
        msg:   String,
    },

    #[error("Invalid default for {decl}.{field}: {msg}")]
    InvalidDefault {
        decl:  String,
        field: String,
        msg:   String,
    },

    #[error("Invalid member {decl}.{field}: {msg}")]
    InvalidMember {
        decl:  String,
        field: String,
        msg:   String,
    },

    #[error("Invalid declaration {decl}: {msg}")]
    InvalidDeclaration {
        decl: String,
        msg:  String,
    },

    #[error("Recursive nesting of {decl} is not allowed")]
    RecursiveType {
        decl: String,
    },
}

impl SchemaError {
    pub(crate) fn member(decl: &str, field: &str, msg: impl Into<String>) -> SchemaError {
        SchemaError::InvalidMember {
            decl:  decl.to_string(),
            field: field.to_string(),
            msg:   msg.into(),
        }
    }

    pub(crate) fn declaration(decl: &str, msg: impl Into<String>) -> SchemaError {
        SchemaError::InvalidDeclaration {
            decl: decl.to_string(),
            msg:  msg.into(),
        }
    }

    pub(crate) fn default_value(decl: &str, field: &str, msg: impl Into<String>) -> SchemaError {
        SchemaError::InvalidDefault {
            decl:  decl.to_string(),
            field: field.to_string(),
            msg:   msg.into(),
        }
    }
}
