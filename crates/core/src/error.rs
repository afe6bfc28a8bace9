//! Error taxonomy for the client core.
//!
//! Every operation fails with the error type of its concern. None of them is retried
//! automatically; recovery is always a fresh user action.

use healthrec_files::FilesError;

/// Problems the user can fix before anything is sent over the network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("file is {size} bytes, larger than the {limit} byte limit")]
    FileTooLarge { size: u64, limit: u64 },
    #[error("no file selected")]
    NoFileSelected,
    #[error("an upload is already in progress")]
    UploadInProgress,
    #[error("date range starts after it ends")]
    InvalidDateRange,
}

/// Failures reported by the auth provider. Messages are shown to the user as they are.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("no account found for {0}")]
    UnknownAccount(String),
    #[error("{0} sign-in is not available")]
    UnsupportedMethod(String),
    #[error("{0}")]
    InvalidEmail(String),
    #[error("account storage error: {0}")]
    Storage(String),
    #[error("{0}")]
    Provider(String),
}

/// Failures reported by an object storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("object already exists: {0}")]
    Conflict(String),
    #[error("storage rejected the request: {0}")]
    Rejected(String),
    #[error("download link expired")]
    Expired,
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<FilesError> for StorageError {
    fn from(e: FilesError) -> Self {
        match e {
            FilesError::ObjectNotFound(key) => StorageError::NotFound(key),
            FilesError::ObjectAlreadyExists(key) => StorageError::Conflict(key),
            FilesError::SignedUrlExpired(_) => StorageError::Expired,
            FilesError::Io(io) => StorageError::Io(io),
            FilesError::InvalidKey(_)
            | FilesError::UnknownSession(_)
            | FilesError::OffsetMismatch { .. }
            | FilesError::SizeMismatch { .. }
            | FilesError::InvalidSignedUrl(_) => StorageError::Rejected(e.to_string()),
            FilesError::InvalidRootDirectory(_)
            | FilesError::Metadata(_)
            | FilesError::SessionTablePoisoned => StorageError::Backend(e.to_string()),
        }
    }
}

/// Failures of the transfer step of an upload. Progress is reset; the user retries manually.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("failed to read the selected file: {0}")]
    Read(std::io::Error),
    #[error("file name cannot be used as a storage key: {0}")]
    InvalidKey(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("upload cancelled")]
    Cancelled,
    #[error("upload task ended without reporting an outcome")]
    Interrupted,
}

/// Failures of the post-upload processing step. Never undoes the upload.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("processing request failed: {0}")]
    Http(String),
    #[error("processing endpoint returned status {0}")]
    Status(u16),
    #[error("processing response could not be read: {0}")]
    Decode(String),
    #[error("processing failed: {}", .0.as_deref().unwrap_or("no reason given"))]
    Rejected(Option<String>),
}

/// Failures of the document query. The listing is emptied.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("permission denied")]
    PermissionDenied,
    #[error("invalid owner identifier: {0}")]
    InvalidOwner(String),
    #[error("document store error: {0}")]
    Store(String),
    #[error("document store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures while downloading or previewing a document.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("document has an invalid storage path: {0}")]
    InvalidPath(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("failed to save file: {0}")]
    Save(std::io::Error),
}

/// Configuration problems found at startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Everything an upload submission can fail with.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
}

/// Umbrella error for callers that drive several flows.
#[derive(Debug, thiserror::Error)]
pub enum HealthRecordError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error(transparent)]
    Processing(#[from] ProcessingError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Download(#[from] DownloadError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<UploadError> for HealthRecordError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::Validation(v) => HealthRecordError::Validation(v),
            UploadError::Transfer(t) => HealthRecordError::Transfer(t),
        }
    }
}

pub type HealthRecordResult<T> = std::result::Result<T, HealthRecordError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_files_errors_map_to_storage_errors() {
        assert!(matches!(
            StorageError::from(FilesError::ObjectNotFound("k".into())),
            StorageError::NotFound(_)
        ));
        assert!(matches!(
            StorageError::from(FilesError::OffsetMismatch {
                expected: 1,
                got: 0
            }),
            StorageError::Rejected(_)
        ));
    }

    #[test]
    fn test_processing_rejected_message() {
        let with = ProcessingError::Rejected(Some("unreadable scan".into()));
        let without = ProcessingError::Rejected(None);
        assert_eq!(with.to_string(), "processing failed: unreadable scan");
        assert_eq!(without.to_string(), "processing failed: no reason given");
    }

    #[test]
    fn test_upload_error_flattens_into_umbrella() {
        let err: HealthRecordError = UploadError::Validation(ValidationError::NoFileSelected).into();
        assert!(matches!(
            err,
            HealthRecordError::Validation(ValidationError::NoFileSelected)
        ));
    }
}
