// error.rs
//! Type-system failures (E1xxx).
//!
//! Every algebraic operation can fail with one of these kinds. Failures are
//! local to the entity being resolved: the scanner and compiler catch them
//! per method or per type, log a diagnostic, and degrade that one entity.

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum TypeSystemError {
    #[error("bad image format: {detail}")]
    #[diagnostic(code(E1001))]
    BadImageFormat { detail: String },

    #[error("could not load type '{namespace}.{name}'")]
    #[diagnostic(code(E1002))]
    TypeLoad { namespace: String, name: String },

    #[error("field '{name}' not found on '{owner}'")]
    #[diagnostic(code(E1003))]
    MissingField { owner: String, name: String },

    #[error("method '{name}' not found on '{owner}'")]
    #[diagnostic(code(E1004))]
    MissingMethod { owner: String, name: String },

    #[error("invalid program: {detail}")]
    #[diagnostic(code(E1005))]
    InvalidProgram { detail: String },
}

impl TypeSystemError {
    pub fn bad_image(detail: impl Into<String>) -> Self {
        TypeSystemError::BadImageFormat {
            detail: detail.into(),
        }
    }

    pub fn type_load(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        TypeSystemError::TypeLoad {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn missing_field(owner: impl Into<String>, name: impl Into<String>) -> Self {
        TypeSystemError::MissingField {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn missing_method(owner: impl Into<String>, name: impl Into<String>) -> Self {
        TypeSystemError::MissingMethod {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn invalid_program(detail: impl Into<String>) -> Self {
        TypeSystemError::InvalidProgram {
            detail: detail.into(),
        }
    }
}

pub type TypeSystemResult<T> = Result<T, TypeSystemError>;
