// src/errors.rs
//! Driver-level errors: everything that can stop a compilation from the
//! command line.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use ingot_compile::CompileError;
use ingot_types::TypeSystemError;

#[derive(Error, Debug, Diagnostic)]
pub enum DriverError {
    #[error("could not read '{path}'")]
    #[diagnostic(code(E0001))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse module description '{path}'")]
    #[diagnostic(code(E0002))]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("'{spec}' is not a valid method spec; expected Namespace.Type::Method")]
    #[diagnostic(code(E0003))]
    BadMethodSpec { spec: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    TypeSystem(#[from] TypeSystemError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Compile(#[from] CompileError),
}

pub type DriverResult<T> = Result<T, DriverError>;
