use alloc::boxed::Box;
use alloc::string::String;

use thiserror::Error;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Error raised by sequence and view operations.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    pub fn out_of_bounds(index: usize, len: usize) -> Error {
        ErrorKind::IndexOutOfBounds { index, len }.into()
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        ErrorKind::InvalidArgument {
            name: name.into(),
            message: message.into(),
        }
        .into()
    }

    pub fn reentrant(operation: &'static str) -> Error {
        ErrorKind::Reentrant { operation }.into()
    }

    pub fn is_out_of_bounds(&self) -> bool {
        matches!(self.kind(), ErrorKind::IndexOutOfBounds { .. })
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("index {index} is out of bounds (len {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("{message}")]
    NameNotFound { name: String, message: String },

    #[error("{message}")]
    DuplicateName { name: String, message: String },

    #[error("named lookup requires a name resolver")]
    NoNameResolver,

    #[error("the sequence is read-only")]
    ReadOnly,

    #[error("the sequence is locked")]
    Locked,

    #[error("value is not of type {expected}")]
    TypeMismatch { expected: &'static str },

    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("item is not part of the view")]
    ItemNotFound,

    #[error("{operation} re-entered while the view was busy")]
    Reentrant { operation: &'static str },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}
