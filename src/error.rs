use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};

/// Failures the compiler detects itself. Everything else — schema
/// inconsistencies, parameter type mismatches — is the responsibility of the
/// QCode builder or the database and is not re-validated here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The operation type has no query compiler (mutations, for one).
    UnknownOperation(String),
    /// An expression node is missing operands its operator requires.
    MalformedExp(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnknownOperation(op) => {
                write!(f, "unknown or unsupported operation type `{op}`")
            }
            Error::MalformedExp(reason) => write!(f, "malformed where expression: {reason}"),
        }
    }
}

// Needed for anyhow
impl StdError for Error {}
