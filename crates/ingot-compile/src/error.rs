// error.rs
//! Pass-level failures (E3xxx).

use miette::Diagnostic;
use thiserror::Error;

use ingot_types::TypeSystemError;

#[derive(Error, Debug, Diagnostic)]
pub enum CompileError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    TypeSystem(#[from] TypeSystemError),

    /// The method cannot be pre-compiled but the program is well-formed;
    /// the runtime will JIT it. Never fatal.
    #[error("method '{method}' requires runtime JIT: {detail}")]
    #[diagnostic(code(E3001))]
    RequiresRuntimeJit { method: String, detail: String },

    /// Internal consistency violation between the scanner and the
    /// compiler. Always fatal.
    #[error("scanner failed to predict compiler demand: {detail}")]
    #[diagnostic(code(E3002))]
    ScannerFailed { detail: String },

    #[error("no compilation root: {detail}")]
    #[diagnostic(code(E3003))]
    NoRoots { detail: String },
}

impl CompileError {
    pub fn requires_runtime_jit(method: impl Into<String>, detail: impl Into<String>) -> Self {
        CompileError::RequiresRuntimeJit {
            method: method.into(),
            detail: detail.into(),
        }
    }

    pub fn scanner_failed(detail: impl Into<String>) -> Self {
        CompileError::ScannerFailed {
            detail: detail.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CompileError::ScannerFailed { .. } | CompileError::NoRoots { .. }
        )
    }
}

pub type CompileResult<T> = Result<T, CompileError>;
