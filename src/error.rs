//! Filesystem Error Types
//!
//! Every operation either completes or fails with one of these codes and
//! no partial mutation. All failures are recoverable at the caller.

use std::fmt;

/// Result type for filesystem operations
pub type FsResult<T> = Result<T, FsError>;

/// Filesystem error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// Invalid argument (bad name, wrong node kind for the operation)
    InvalidArgument,
    /// No such file or directory
    NotFound,
    /// File exists
    AlreadyExists,
    /// Not a directory
    NotADirectory,
    /// Is a directory
    IsADirectory,
    /// Directory not empty
    NotEmpty,
    /// Rename would move a directory into its own subtree
    InvalidMove,
    /// No space left on device
    NoSpace,
    /// Name too long
    NameTooLong,
    /// Read-only filesystem
    ReadOnly,
    /// Malformed value for a recognized mount option
    ParseError,
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "Invalid argument"),
            Self::NotFound => write!(f, "No such file or directory"),
            Self::AlreadyExists => write!(f, "File exists"),
            Self::NotADirectory => write!(f, "Not a directory"),
            Self::IsADirectory => write!(f, "Is a directory"),
            Self::NotEmpty => write!(f, "Directory not empty"),
            Self::InvalidMove => write!(f, "Cannot move a directory into its own subtree"),
            Self::NoSpace => write!(f, "No space left on device"),
            Self::NameTooLong => write!(f, "Name too long"),
            Self::ReadOnly => write!(f, "Read-only filesystem"),
            Self::ParseError => write!(f, "Malformed mount option value"),
        }
    }
}

impl std::error::Error for FsError {}
