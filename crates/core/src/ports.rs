//! Seams to the external collaborators.
//!
//! The client core never talks to a hosted service directly. Each collaborator is an async
//! trait; `crate::backends` provides local implementations and tests provide fakes.

use crate::documents::{DocumentQuery, DocumentRecord};
use crate::error::{AuthError, ProcessingError, QueryError, StorageError};
use crate::session::Identity;
use api_shared::{ProcessReq, ProcessRes};
use async_trait::async_trait;
use healthrec_files::{ObjectKey, SignedUrl};
use healthrec_types::EmailAddress;
use tokio::sync::mpsc;

/// Stream of session changes from the auth provider.
///
/// The provider sends the current state as soon as a subscription is made, then one message
/// per change. `None` means signed out.
pub type AuthSubscription = mpsc::UnboundedReceiver<Option<Identity>>;

/// Hosted authentication provider.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in_with_email(
        &self,
        email: &EmailAddress,
        password: &str,
    ) -> Result<Identity, AuthError>;

    async fn sign_in_with_google(&self) -> Result<Identity, AuthError>;

    async fn send_password_reset(&self, email: &EmailAddress) -> Result<(), AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    fn subscribe(&self) -> AuthSubscription;
}

/// Hosted document database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Runs the one query shape the client uses: owner and status equality, ordered by test
    /// date descending.
    async fn query(&self, query: &DocumentQuery) -> Result<Vec<DocumentRecord>, QueryError>;

    /// Stores a new record. Only the processing step writes records.
    async fn insert(&self, record: &DocumentRecord) -> Result<(), QueryError>;
}

/// Hosted object storage with resumable uploads.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Opens an upload and returns its session id.
    async fn begin_upload(&self, key: &ObjectKey, total_bytes: u64) -> Result<String, StorageError>;

    /// Sends bytes at `offset`; returns the bytes stored so far.
    async fn upload_chunk(
        &self,
        session_id: &str,
        offset: u64,
        chunk: Vec<u8>,
    ) -> Result<u64, StorageError>;

    async fn finish_upload(&self, session_id: &str) -> Result<(), StorageError>;

    async fn abort_upload(&self, session_id: &str) -> Result<(), StorageError>;

    async fn download_url(&self, key: &ObjectKey) -> Result<SignedUrl, StorageError>;

    async fn fetch(&self, url: &SignedUrl) -> Result<Vec<u8>, StorageError>;
}

/// External processing endpoint that turns a stored upload into a document record.
#[async_trait]
pub trait ProcessingClient: Send + Sync {
    async fn process(&self, req: &ProcessReq) -> Result<ProcessRes, ProcessingError>;
}
