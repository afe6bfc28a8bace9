//! Identifier utilities.
//!
//! HealthRecord uses two kinds of identifier:
//!
//! - **Record identifiers** ([`UuidService`]): a *canonical* UUID representation of
//!   **32 lowercase hexadecimal characters** (no hyphens), used for document records.
//! - **Storage timestamps** ([`MonotonicClock`]): millisecond timestamps that are strictly
//!   increasing within a process, used to prefix storage keys so that two uploads of the same
//!   file never collide and keys sort in rough upload order.
//!
//! ## Canonical UUID form
//! - Length: 32
//! - Characters: `0-9` and `a-f` only
//! - Example: `550e8400e29b41d4a716446655440000`
//!
//! Non-canonical values (uppercase, hyphenated, wrong length, non-hex) are rejected by
//! [`UuidService::parse`].

mod service;

pub use service::{MonotonicClock, TimestampMillis, Uuid, UuidService};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type UuidResult<T> = Result<T, UuidError>;
