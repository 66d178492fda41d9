//! Document error type.

use std::fmt;
use std::path::PathBuf;

use scriptorium_dispatch::DispatchError;

/// Errors from document operations.
///
/// Display strings are what remote callers see, so they are written as
/// complete sentences.
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("No file path specified. Provide a path to save the document.")]
    NoPath,
    #[error("No text is currently selected.")]
    NoSelection,
    #[error("Position {position} is out of range (0..{len}).")]
    OutOfRange { position: i64, len: usize },
    #[error("Selection {start}+{length} is out of range (0..{len}).")]
    SelectionOutOfRange { start: i64, length: i64, len: usize },
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Coarse classification of an [`EditorError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    OutOfRange,
    Io,
    OwnerUnavailable,
}

impl EditorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::NoPath | Self::NoSelection => ErrorKind::InvalidState,
            Self::OutOfRange { .. } | Self::SelectionOutOfRange { .. } => ErrorKind::OutOfRange,
            Self::Io { .. } => ErrorKind::Io,
            Self::Dispatch(_) => ErrorKind::OwnerUnavailable,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "not_found",
            Self::InvalidState => "invalid_state",
            Self::OutOfRange => "out_of_range",
            Self::Io => "io",
            Self::OwnerUnavailable => "owner_unavailable",
        };
        f.write_str(name)
    }
}
