//! Error types for smbfs

use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::status::NtStatus;

/// Result type for share operations
pub type Result<T> = std::result::Result<T, SmbError>;

/// All errors that can surface from share operations.
#[derive(Error, Debug)]
pub enum SmbError {
    /// Authentication failed
    #[error("authentication failed")]
    Auth,

    /// Permission denied
    #[error("permission denied: {0}")]
    Permission(String),

    /// Path not found
    #[error("path not found: {0}")]
    NotFound(String),

    /// Fatal protocol status from a single request. Pending and end-of-file
    /// never reach this variant; everything else does, unretried.
    #[error("protocol failure during {op}: status {status}")]
    Protocol { op: &'static str, status: NtStatus },

    /// Pending retries exhausted the session-timeout budget
    #[error("{op} still pending after {budget:?}")]
    Timeout { op: &'static str, budget: Duration },

    /// Operation on a disposed stream, connection, or credential scope
    #[error("used after close")]
    Closed,

    /// Seek resolved to a position before the start of the stream
    #[error("seek before start of stream")]
    InvalidSeek,

    /// Connection error
    #[error("connection error: {0}")]
    Connection(String),

    /// Invalid path or URI
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Unsupported feature or operation
    #[error("unsupported: {0}")]
    Unsupported(&'static str),

    /// Local I/O error (copy destinations, config files)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl SmbError {
    /// Check if this error is worth retrying at a higher layer
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SmbError::Timeout { .. } | SmbError::Connection(_) | SmbError::Io(_)
        )
    }

    /// Check if this error indicates the resource doesn't exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, SmbError::NotFound(_))
    }

    /// Check if this error is a permission or authentication issue
    pub fn is_permission_error(&self) -> bool {
        matches!(self, SmbError::Permission(_) | SmbError::Auth)
    }

    /// Wrap a fatal protocol status, translating the well-known codes into
    /// their dedicated variants so callers can match without status tables.
    pub(crate) fn from_status(op: &'static str, status: NtStatus, path: &str) -> SmbError {
        match status {
            NtStatus::LOGON_FAILURE => SmbError::Auth,
            NtStatus::ACCESS_DENIED => SmbError::Permission(path.to_string()),
            NtStatus::OBJECT_NAME_NOT_FOUND | NtStatus::OBJECT_PATH_NOT_FOUND => {
                SmbError::NotFound(path.to_string())
            }
            other => SmbError::Protocol { op, status: other },
        }
    }
}

impl From<SmbError> for io::Error {
    fn from(err: SmbError) -> io::Error {
        let kind = match &err {
            SmbError::NotFound(_) => io::ErrorKind::NotFound,
            SmbError::Auth | SmbError::Permission(_) => io::ErrorKind::PermissionDenied,
            SmbError::Timeout { .. } => io::ErrorKind::TimedOut,
            SmbError::InvalidPath(_) | SmbError::InvalidSeek | SmbError::Config(_) => {
                io::ErrorKind::InvalidInput
            }
            SmbError::Connection(_) => io::ErrorKind::ConnectionAborted,
            SmbError::Io(e) => e.kind(),
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}
