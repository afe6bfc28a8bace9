//! Object storage adapter over [`FilesService`].
//!
//! `FilesService` does blocking file I/O, so every call runs on the blocking pool.

use crate::error::StorageError;
use crate::ports::ObjectStorage;
use async_trait::async_trait;
use healthrec_files::{FilesError, FilesService, ObjectKey, SignedUrl};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct LocalObjectStorage {
    files: Arc<FilesService>,
}

impl LocalObjectStorage {
    pub fn new(files: Arc<FilesService>) -> Self {
        Self { files }
    }

    pub fn files(&self) -> &Arc<FilesService> {
        &self.files
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&FilesService) -> Result<T, FilesError> + Send + 'static,
    {
        let files = self.files.clone();
        tokio::task::spawn_blocking(move || op(&files))
            .await
            .map_err(|e| StorageError::Backend(format!("storage task failed: {}", e)))?
            .map_err(StorageError::from)
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn begin_upload(&self, key: &ObjectKey, total_bytes: u64) -> Result<String, StorageError> {
        let key = key.clone();
        let session = self
            .blocking(move |files| files.begin_upload(&key, total_bytes))
            .await?;
        Ok(session.id)
    }

    async fn upload_chunk(
        &self,
        session_id: &str,
        offset: u64,
        chunk: Vec<u8>,
    ) -> Result<u64, StorageError> {
        let session_id = session_id.to_owned();
        self.blocking(move |files| files.upload_chunk(&session_id, offset, &chunk))
            .await
    }

    async fn finish_upload(&self, session_id: &str) -> Result<(), StorageError> {
        let session_id = session_id.to_owned();
        let metadata = self
            .blocking(move |files| files.finish_upload(&session_id))
            .await?;
        tracing::debug!(key = %metadata.key, hash = %metadata.hash, "object committed");
        Ok(())
    }

    async fn abort_upload(&self, session_id: &str) -> Result<(), StorageError> {
        let session_id = session_id.to_owned();
        self.blocking(move |files| files.abort_upload(&session_id))
            .await
    }

    async fn download_url(&self, key: &ObjectKey) -> Result<SignedUrl, StorageError> {
        let key = key.clone();
        self.blocking(move |files| files.signed_url(&key)).await
    }

    async fn fetch(&self, url: &SignedUrl) -> Result<Vec<u8>, StorageError> {
        let url = url.url.clone();
        self.blocking(move |files| files.read_signed(&url)).await
    }
}
