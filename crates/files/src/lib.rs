//! HealthRecord local object storage
//!
//! A filesystem-backed stand-in for hosted object storage. It offers the two capabilities the
//! client core relies on:
//!
//! - **Resumable uploads**: an upload is opened for a key and a declared size, bytes are
//!   appended chunk by chunk at explicit offsets, and the object only becomes visible when the
//!   upload is finished. An interrupted upload can be resumed from [`FilesService::staged_len`].
//! - **Signed download URLs**: short-lived URLs carrying an expiry and a SHA-256 signature over
//!   the key, verified again when the URL is fetched.
//!
//! ## Layout
//!
//! ```text
//! <root>/
//! ├── .staging/           # in-flight uploads, one .partial file per session
//! ├── objects/
//! │   └── <owner>/<timestamp>-<name>
//! └── metadata/
//!     └── <owner>/<timestamp>-<name>.json
//! ```
//!
//! Objects are immutable: opening an upload for a key that already holds an object fails.

mod constants;
mod files;

pub use constants::{METADATA_DIR_NAME, OBJECTS_DIR_NAME, SIGNED_URL_SCHEME, STAGING_DIR_NAME};
pub use files::{FilesService, ObjectKey, ObjectMetadata, SignedUrl, UploadSession};

/// Errors that can occur during storage operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Root directory does not exist or is not a directory
    #[error("Invalid root directory: {0}")]
    InvalidRootDirectory(String),

    /// Object key failed validation (empty segments, traversal, reserved characters)
    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    /// An object is already stored under this key
    #[error("Object already exists: {0}")]
    ObjectAlreadyExists(String),

    /// No object is stored under this key
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    /// The upload session is unknown (never opened, finished or aborted)
    #[error("Unknown upload session: {0}")]
    UnknownSession(String),

    /// A chunk was written at an offset other than the current staged length
    #[error("Chunk offset mismatch: expected {expected}, got {got}")]
    OffsetMismatch { expected: u64, got: u64 },

    /// More bytes were sent than the upload declared, or fewer at finish time
    #[error("Upload size mismatch: declared {declared}, received {received}")]
    SizeMismatch { declared: u64, received: u64 },

    /// Signed URL could not be parsed or its signature does not match
    #[error("Invalid signed URL: {0}")]
    InvalidSignedUrl(String),

    /// Signed URL is past its expiry
    #[error("Signed URL expired at {0}")]
    SignedUrlExpired(chrono::DateTime<chrono::Utc>),

    /// Metadata could not be encoded or decoded
    #[error("Metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    /// Internal session table lock was poisoned by a panicking writer
    #[error("Upload session table is unavailable")]
    SessionTablePoisoned,

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
