//! Constants used throughout the HealthRecord core crate.

/// Largest file the upload pipeline accepts (10 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Default size of each chunk sent to object storage.
pub const DEFAULT_UPLOAD_CHUNK_BYTES: usize = 256 * 1024;

/// Default lifetime of signed download URLs, in seconds.
pub const DEFAULT_URL_TTL_SECS: i64 = 300;

/// Capacity of the per-upload progress channel.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 16;

/// Default directory for local data when no explicit directory is configured.
pub const DEFAULT_DATA_DIR: &str = "healthrec_data";

/// Default processing endpoint.
pub const DEFAULT_PROCESSING_URL: &str = "http://127.0.0.1:3000/process";

/// Directory (under the data dir) holding document records.
pub const DOCUMENTS_DIR_NAME: &str = "documents";

/// Directory (under the data dir) used as the object storage root.
pub const STORAGE_DIR_NAME: &str = "storage";

/// Directory (under the data dir) holding local accounts and the persisted session.
pub const AUTH_DIR_NAME: &str = "auth";

/// Local accounts file inside the auth directory.
pub const ACCOUNTS_FILENAME: &str = "accounts.yaml";

/// Persisted session file inside the auth directory.
pub const SESSION_FILENAME: &str = "session.json";

/// Outbox of password reset requests inside the auth directory.
pub const RESET_OUTBOX_FILENAME: &str = "password_resets.log";

/// Status value of documents visible on the timeline.
pub const ACTIVE_STATUS: &str = "active";
