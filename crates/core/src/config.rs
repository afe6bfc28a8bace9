//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services.
//! Nothing below reads environment variables on its own; binaries hand in a lookup function
//! (normally `std::env::var`) after loading `.env`.

use crate::constants::{
    AUTH_DIR_NAME, DEFAULT_DATA_DIR, DEFAULT_PROCESSING_URL, DEFAULT_UPLOAD_CHUNK_BYTES,
    DEFAULT_URL_TTL_SECS, DOCUMENTS_DIR_NAME, MAX_UPLOAD_BYTES, STORAGE_DIR_NAME,
};
use crate::error::ConfigError;
use healthrec_types::NonEmptyText;
use std::path::{Path, PathBuf};

pub const DATA_DIR_VAR: &str = "HEALTHREC_DATA_DIR";
pub const PROCESSING_URL_VAR: &str = "HEALTHREC_PROCESSING_URL";
pub const SIGNING_SECRET_VAR: &str = "HEALTHREC_SIGNING_SECRET";
pub const CHUNK_BYTES_VAR: &str = "HEALTHREC_UPLOAD_CHUNK_BYTES";
pub const URL_TTL_VAR: &str = "HEALTHREC_URL_TTL_SECS";
pub const API_KEY_VAR: &str = "API_KEY";

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    processing_url: String,
    signing_secret: NonEmptyText,
    chunk_bytes: usize,
    url_ttl: chrono::Duration,
    max_upload_bytes: u64,
    api_key: Option<String>,
}

impl CoreConfig {
    /// Configuration with defaults for everything but the signing secret.
    pub fn new(data_dir: PathBuf, signing_secret: NonEmptyText) -> Self {
        Self {
            data_dir,
            processing_url: DEFAULT_PROCESSING_URL.to_owned(),
            signing_secret,
            chunk_bytes: DEFAULT_UPLOAD_CHUNK_BYTES,
            url_ttl: chrono::Duration::seconds(DEFAULT_URL_TTL_SECS),
            max_upload_bytes: MAX_UPLOAD_BYTES,
            api_key: None,
        }
    }

    /// Resolves the configuration from `lookup`, applying defaults for unset variables.
    ///
    /// Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the signing secret is unset and
    /// `ConfigError::Invalid` for values that do not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let signing_secret = get(SIGNING_SECRET_VAR)
            .and_then(|v| NonEmptyText::new(v).ok())
            .ok_or(ConfigError::Missing(SIGNING_SECRET_VAR))?;

        let data_dir = get(DATA_DIR_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        let mut cfg = Self::new(data_dir, signing_secret);

        if let Some(url) = get(PROCESSING_URL_VAR) {
            cfg = cfg.with_processing_url(url)?;
        }

        if let Some(raw) = get(CHUNK_BYTES_VAR) {
            let chunk_bytes = parse_positive(CHUNK_BYTES_VAR, &raw)?;
            cfg = cfg.with_chunk_bytes(chunk_bytes as usize);
        }

        if let Some(raw) = get(URL_TTL_VAR) {
            let secs = parse_positive(URL_TTL_VAR, &raw)?;
            cfg = cfg.with_url_ttl(chrono::Duration::seconds(secs as i64));
        }

        cfg.api_key = get(API_KEY_VAR);
        Ok(cfg)
    }

    pub fn with_processing_url(mut self, url: impl Into<String>) -> Result<Self, ConfigError> {
        let url = url.into();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                var: PROCESSING_URL_VAR,
                reason: format!("expected an http(s) URL, got {}", url),
            });
        }
        self.processing_url = url;
        Ok(self)
    }

    pub fn with_chunk_bytes(mut self, chunk_bytes: usize) -> Self {
        self.chunk_bytes = chunk_bytes.max(1);
        self
    }

    pub fn with_url_ttl(mut self, url_ttl: chrono::Duration) -> Self {
        self.url_ttl = url_ttl;
        self
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: u64) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.data_dir.join(DOCUMENTS_DIR_NAME)
    }

    pub fn storage_dir(&self) -> PathBuf {
        self.data_dir.join(STORAGE_DIR_NAME)
    }

    pub fn auth_dir(&self) -> PathBuf {
        self.data_dir.join(AUTH_DIR_NAME)
    }

    pub fn processing_url(&self) -> &str {
        &self.processing_url
    }

    pub fn signing_secret(&self) -> &NonEmptyText {
        &self.signing_secret
    }

    pub fn chunk_bytes(&self) -> usize {
        self.chunk_bytes
    }

    pub fn url_ttl(&self) -> chrono::Duration {
        self.url_ttl
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    /// Creates the data directory layout if it does not exist yet.
    pub fn ensure_data_dirs(&self) -> std::io::Result<()> {
        for dir in [self.documents_dir(), self.storage_dir(), self.auth_dir()] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

fn parse_positive(var: &'static str, raw: &str) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid {
            var,
            reason: "must be greater than zero".into(),
        }),
        Ok(n) => Ok(n),
        Err(e) => Err(ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
    }
}
