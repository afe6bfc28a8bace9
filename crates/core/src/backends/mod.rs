//! Local implementations of the collaborator ports.
//!
//! Everything lives under the configured data directory:
//!
//! ```text
//! <data_dir>/
//!   auth/         accounts.yaml, session.json, password_resets.log
//!   documents/    <owner>/<record id>.json
//!   storage/      objects/, metadata/, .staging/
//! ```

pub mod http_processing;
pub mod local_auth;
pub mod local_documents;
pub mod local_storage;

pub use http_processing::HttpProcessingClient;
pub use local_auth::{LocalAccount, LocalAuthProvider};
pub use local_documents::LocalDocumentStore;
pub use local_storage::LocalObjectStorage;

use crate::config::CoreConfig;
use crate::error::{ConfigError, HealthRecordError, HealthRecordResult};
use healthrec_files::FilesService;
use std::sync::Arc;

/// The set of local backends a front end wires together.
#[derive(Clone)]
pub struct LocalBackends {
    pub auth: Arc<LocalAuthProvider>,
    pub documents: Arc<LocalDocumentStore>,
    pub storage: Arc<LocalObjectStorage>,
    pub processing: Arc<HttpProcessingClient>,
}

impl LocalBackends {
    /// Opens every backend under the configured data directory, creating it if needed.
    pub fn open(cfg: &CoreConfig) -> HealthRecordResult<Self> {
        cfg.ensure_data_dirs().map_err(|e| ConfigError::Invalid {
            var: crate::config::DATA_DIR_VAR,
            reason: e.to_string(),
        })?;

        let files = FilesService::new(
            &cfg.storage_dir(),
            cfg.signing_secret().clone(),
            cfg.url_ttl(),
        )
        .map_err(|e| HealthRecordError::Storage(e.into()))?;

        Ok(Self {
            auth: Arc::new(LocalAuthProvider::open(&cfg.auth_dir())?),
            documents: Arc::new(LocalDocumentStore::new(cfg.documents_dir())),
            storage: Arc::new(LocalObjectStorage::new(Arc::new(files))),
            processing: Arc::new(HttpProcessingClient::new(
                cfg.processing_url(),
                cfg.api_key().map(str::to_owned),
            )?),
        })
    }
}
