use remount_core::{CodecError, PathError, ResourcePath};

use crate::writer::RecordFailure;

/// Errors surfaced by the mount.
///
/// Reads degrade to absence or to an inaccessible stub instead of failing;
/// only caller mistakes and write failures come back as `Err`.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("path error: {0}")]
    Path(#[from] PathError),

    #[error("invalid value: {0}")]
    Codec(#[from] CodecError),

    #[error("transport error: {0}")]
    Http(#[from] remount_http::Error),

    #[error("invalid configuration: {message}")]
    Config { message: String },

    #[error("'{path}' is not below the mount root")]
    NotLocal { path: ResourcePath },

    #[error("no resource at '{path}'")]
    NotFound { path: ResourcePath },

    #[error("a resource already exists at '{path}'")]
    AlreadyExists { path: ResourcePath },

    #[error("invalid operation: {message}")]
    InvalidOperation { message: String },

    #[error("property '{property}' of '{path}' is not a binary")]
    NotBinary { path: ResourcePath, property: String },

    #[error("commit failed for {} of the pending changes", failures.len())]
    Commit { failures: Vec<RecordFailure> },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }
}
