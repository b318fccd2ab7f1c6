//! Errors - error taxonomy and operational classification.

use thiserror::Error;

use crate::ports::{Collection, StoreError};

/// ErrorKind classifies a failure for callers deciding whether to retry.
///
/// - Transient: losing an optimistic race; trying again later may succeed
/// - Permanent: the request itself is invalid or unsupported
/// - Infrastructure: the backing store failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
    Infrastructure,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Raised only once the bounded read-modify-write budget is spent.
    #[error("version conflict on {collection}/{id} after {attempts} attempts")]
    VersionConflict {
        collection: Collection,
        id: String,
        attempts: u32,
    },

    #[error("document store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}

impl StorageError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::InvalidArgument(_) | StorageError::Unsupported(_) => ErrorKind::Permanent,
            StorageError::VersionConflict { .. } => ErrorKind::Transient,
            StorageError::StoreUnavailable(_) => ErrorKind::Infrastructure,
        }
    }
}

impl From<StoreError> for StorageError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { collection, id } => StorageError::VersionConflict {
                collection,
                id,
                attempts: 1,
            },
            StoreError::Unavailable(reason) => StorageError::StoreUnavailable(reason),
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Reject an empty required string argument.
pub(crate) fn require_non_empty(value: &str, name: &str) -> Result<()> {
    if value.is_empty() {
        return Err(StorageError::invalid_argument(format!("`{name}` must not be empty")));
    }
    Ok(())
}
