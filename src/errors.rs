use std::error::Error;
use std::fmt;

/// Stores the different kinds of errors raised by the prognostics core.
///
/// Construction-time errors abort construction and surface to the caller.
/// Per-step errors in an observer surface to the caller and leave the
/// observer in its previous state. Per-sample errors inside a Monte-Carlo
/// prediction are logged and only cost that sample.
#[derive(Clone, Debug, PartialEq)]
pub enum ProgError {
    /// A required configuration key is missing or a configured value has an
    /// impossible shape (non-square Q/R, noise vector of the wrong length).
    BadConfig(String),
    /// `step` was called before `initialize`.
    NotInitialized,
    /// A runtime input was rejected, e.g. a non-advancing timestamp.
    BadInput(String),
    /// Element access past the bounds of a matrix or a UData backing array.
    OutOfRange(String),
    /// A shape mismatch in matrix arithmetic, a non-square operand to a
    /// square-only operation, a non-positive-definite input to Cholesky, or a
    /// singular matrix in an inversion.
    DomainError(String),
}

impl fmt::Display for ProgError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProgError::BadConfig(msg) => write!(f, "bad configuration: {}", msg),
            ProgError::NotInitialized => {
                write!(f, "step called before the observer was initialized")
            }
            ProgError::BadInput(msg) => write!(f, "bad input: {}", msg),
            ProgError::OutOfRange(msg) => write!(f, "out of range: {}", msg),
            ProgError::DomainError(msg) => write!(f, "domain error: {}", msg),
        }
    }
}

impl Error for ProgError {}
