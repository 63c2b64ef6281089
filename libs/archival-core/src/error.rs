//! Closed error taxonomy for archive operations (spec §4.2).

use thiserror::Error;

/// One entry: a fully-qualified path plus the messages collected there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub path: String,
    pub messages: Vec<String>,
}

/// Accumulated validation failures, thrown once at the end of an operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("validation failed: {} path(s) reported errors", errors.len())]
pub struct ValidationException {
    pub errors: Vec<ValidationError>,
}

/// Closed error kind set (spec §4.2). Every non-validation variant aborts
/// the current operation immediately when constructed.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("parsing error at byte {offset}: {message}")]
    Parsing { offset: usize, message: String },

    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error at `{path}`: {source}")]
    FileIo { path: std::path::PathBuf, source: std::io::Error },

    #[error("unregistered enum value for `{type_name}`: {value}")]
    UnregisteredEnum { type_name: &'static str, value: String },

    #[error("mismatched types at `{path}`: {message}")]
    MismatchedTypes { path: String, message: String },

    #[error("numeric overflow at `{path}`: {message}")]
    Overflow { path: String, message: String },

    #[error("UTF encoding error at `{path}`: {message}")]
    UtfEncoding { path: String, message: String },

    #[error(transparent)]
    Validation(#[from] ValidationException),

    #[error("array scope read past end of input at `{path}`")]
    OutOfRange { path: String },

    #[error("internal invariant violation: {0}")]
    Unknown(String),
}

impl ArchiveError {
    pub fn mismatched_types(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MismatchedTypes { path: path.into(), message: message.into() }
    }

    pub fn overflow(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Overflow { path: path.into(), message: message.into() }
    }

    pub fn utf_encoding(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UtfEncoding { path: path.into(), message: message.into() }
    }

    pub fn unregistered_enum(type_name: &'static str, value: impl Into<String>) -> Self {
        Self::UnregisteredEnum { type_name, value: value.into() }
    }

    pub fn parsing(offset: usize, message: impl Into<String>) -> Self {
        Self::Parsing { offset, message: message.into() }
    }

    pub fn file_io(path: impl Into<std::path::PathBuf>, source: std::io::Error) -> Self {
        Self::FileIo { path: path.into(), source }
    }

    pub fn unsupported_encoding(encoding: impl Into<String>) -> Self {
        Self::UnsupportedEncoding(encoding.into())
    }
}
