//! Filesystem object store implementation
//!
//! This module provides [`FilesService`], the local object store behind HealthRecord's
//! upload and download flows.
//!
//! # Upload lifecycle
//!
//! 1. [`FilesService::begin_upload`] validates the key, refuses keys that already hold an
//!    object, and creates an empty staging file.
//! 2. [`FilesService::upload_chunk`] appends bytes at an explicit offset. The offset must equal
//!    the bytes staged so far, which makes replaying a chunk after a lost acknowledgement an
//!    error rather than silent duplication.
//! 3. [`FilesService::finish_upload`] checks the declared size, hashes the content, sniffs the
//!    media type and moves the staged file into place. Metadata is written alongside.
//! 4. [`FilesService::abort_upload`] discards the staging file.
//!
//! # Signed URLs
//!
//! `healthrec-files://objects/<key>?expires=<unix seconds>&signature=<hex>` where the signature
//! is the SHA-256 of the signing secret, the key and the expiry. Fetching re-derives the
//! signature and checks the expiry against the current time.

use crate::constants::{METADATA_DIR_NAME, OBJECTS_DIR_NAME, SIGNED_URL_SCHEME, STAGING_DIR_NAME};
use crate::FilesError;
use chrono::{DateTime, Duration, Utc};
use healthrec_types::NonEmptyText;
use healthrec_uuid::UuidService;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A validated object key such as `3f2a.../1686000000000-scan.pdf`.
///
/// Keys are relative, `/`-separated paths. Every segment must be non-empty and must not be
/// `.` or `..`; backslashes, `?`, `#` and control characters are rejected so that a key maps
/// onto exactly one path under the storage root and survives inside a signed URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey(NonEmptyText);

impl ObjectKey {
    /// Validates a key.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidKey`] describing the first problem found.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, FilesError> {
        let raw = input.as_ref();
        let text = NonEmptyText::new(raw)
            .map_err(|_| FilesError::InvalidKey("key cannot be empty".into()))?;

        if text.as_str() != raw {
            return Err(FilesError::InvalidKey(format!(
                "key has surrounding whitespace: '{}'",
                raw
            )));
        }

        if raw.starts_with('/') {
            return Err(FilesError::InvalidKey(format!("key must be relative: '{}'", raw)));
        }

        if raw
            .chars()
            .any(|c| c.is_control() || matches!(c, '\\' | '?' | '#'))
        {
            return Err(FilesError::InvalidKey(format!(
                "key contains a reserved character: '{}'",
                raw
            )));
        }

        for segment in raw.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(FilesError::InvalidKey(format!(
                    "key has an empty or relative segment: '{}'",
                    raw
                )));
            }
        }

        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the final segment of the key (the stored file name).
    pub fn file_name(&self) -> &str {
        self.as_str().rsplit('/').next().unwrap_or(self.as_str())
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata recorded for every committed object.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct ObjectMetadata {
    /// The key the object is stored under
    pub key: NonEmptyText,

    /// Hashing algorithm used (always "sha256")
    pub hash_algorithm: NonEmptyText,

    /// Hexadecimal digest of the content
    pub hash: NonEmptyText,

    /// Size of the object in bytes
    pub size_bytes: u64,

    /// Sniffed media type, best effort
    pub media_type: Option<NonEmptyText>,

    /// UTC timestamp when the upload was finished
    pub stored_at: DateTime<Utc>,
}

/// Handle for an open upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    pub id: String,
    pub key: ObjectKey,
    pub total_bytes: u64,
}

/// A short-lived download URL.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug)]
struct StagedUpload {
    key: ObjectKey,
    total_bytes: u64,
    written: u64,
    staging_path: PathBuf,
}

/// Local object store rooted at one directory.
///
/// The service is `Send + Sync` and is meant to be shared behind an `Arc`. It is not `Clone`:
/// the table of open upload sessions lives in the instance.
#[derive(Debug)]
pub struct FilesService {
    root_directory: PathBuf,
    signing_secret: NonEmptyText,
    url_ttl: Duration,
    sessions: Mutex<HashMap<String, StagedUpload>>,
}

impl FilesService {
    /// Creates a store rooted at `root_directory`.
    ///
    /// # Errors
    ///
    /// Returns `FilesError::InvalidRootDirectory` if the root does not exist, is not a
    /// directory or cannot be canonicalised.
    pub fn new(
        root_directory: &Path,
        signing_secret: NonEmptyText,
        url_ttl: Duration,
    ) -> Result<Self, FilesError> {
        if !root_directory.is_dir() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Directory does not exist: {}",
                root_directory.display()
            )));
        }

        let root_directory = root_directory.canonicalize().map_err(|e| {
            FilesError::InvalidRootDirectory(format!(
                "Cannot canonicalize path {}: {}",
                root_directory.display(),
                e
            ))
        })?;

        Ok(Self {
            root_directory,
            signing_secret,
            url_ttl,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    /// Opens a resumable upload for `key` declaring `total_bytes`.
    ///
    /// # Errors
    ///
    /// Returns `FilesError::ObjectAlreadyExists` when the key already holds an object, or
    /// `FilesError::Io` if the staging file cannot be created.
    pub fn begin_upload(
        &self,
        key: &ObjectKey,
        total_bytes: u64,
    ) -> Result<UploadSession, FilesError> {
        if self.object_path(key).exists() {
            return Err(FilesError::ObjectAlreadyExists(key.to_string()));
        }

        let staging_dir = self.root_directory.join(STAGING_DIR_NAME);
        fs::create_dir_all(&staging_dir)?;

        let id = UuidService::new().to_string();
        let staging_path = staging_dir.join(format!("{}.partial", id));
        fs::File::create(&staging_path)?;

        let staged = StagedUpload {
            key: key.clone(),
            total_bytes,
            written: 0,
            staging_path,
        };
        self.sessions
            .lock()
            .map_err(|_| FilesError::SessionTablePoisoned)?
            .insert(id.clone(), staged);

        tracing::debug!(session = %id, key = %key, total_bytes, "upload opened");

        Ok(UploadSession {
            id,
            key: key.clone(),
            total_bytes,
        })
    }

    /// Appends `chunk` at `offset` and returns the number of bytes staged afterwards.
    ///
    /// # Errors
    ///
    /// - `FilesError::UnknownSession` if the session is not open
    /// - `FilesError::OffsetMismatch` if `offset` differs from the staged length
    /// - `FilesError::SizeMismatch` if the chunk would exceed the declared size
    pub fn upload_chunk(
        &self,
        session_id: &str,
        offset: u64,
        chunk: &[u8],
    ) -> Result<u64, FilesError> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| FilesError::SessionTablePoisoned)?;
        let staged = sessions
            .get_mut(session_id)
            .ok_or_else(|| FilesError::UnknownSession(session_id.to_owned()))?;

        if offset != staged.written {
            return Err(FilesError::OffsetMismatch {
                expected: staged.written,
                got: offset,
            });
        }

        let after = staged.written + chunk.len() as u64;
        if after > staged.total_bytes {
            return Err(FilesError::SizeMismatch {
                declared: staged.total_bytes,
                received: after,
            });
        }

        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(&staged.staging_path)?;
        file.write_all(chunk)?;
        staged.written = after;

        Ok(after)
    }

    /// Returns how many bytes are staged for an open upload, for resuming.
    pub fn staged_len(&self, session_id: &str) -> Result<u64, FilesError> {
        let sessions = self
            .sessions
            .lock()
            .map_err(|_| FilesError::SessionTablePoisoned)?;
        sessions
            .get(session_id)
            .map(|s| s.written)
            .ok_or_else(|| FilesError::UnknownSession(session_id.to_owned()))
    }

    /// Commits an upload and returns the stored object's metadata.
    ///
    /// # Errors
    ///
    /// - `FilesError::UnknownSession` if the session is not open
    /// - `FilesError::SizeMismatch` if fewer bytes than declared were staged (the session stays
    ///   open so the caller can resume)
    /// - `FilesError::ObjectAlreadyExists` if another upload committed the key first
    pub fn finish_upload(&self, session_id: &str) -> Result<ObjectMetadata, FilesError> {
        let staged = {
            let mut sessions = self
                .sessions
                .lock()
                .map_err(|_| FilesError::SessionTablePoisoned)?;
            let staged = sessions
                .get(session_id)
                .ok_or_else(|| FilesError::UnknownSession(session_id.to_owned()))?;
            if staged.written != staged.total_bytes {
                return Err(FilesError::SizeMismatch {
                    declared: staged.total_bytes,
                    received: staged.written,
                });
            }
            sessions
                .remove(session_id)
                .ok_or_else(|| FilesError::UnknownSession(session_id.to_owned()))?
        };

        let object_path = self.object_path(&staged.key);
        if object_path.exists() {
            let _ = fs::remove_file(&staged.staging_path);
            return Err(FilesError::ObjectAlreadyExists(staged.key.to_string()));
        }

        let hash = hash_file(&staged.staging_path)?;
        let media_type = infer::get_from_path(&staged.staging_path)?
            .and_then(|kind| NonEmptyText::new(kind.mime_type()).ok());

        if let Some(parent) = object_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&staged.staging_path, &object_path)?;

        let metadata = ObjectMetadata {
            key: NonEmptyText::new(staged.key.as_str())
                .map_err(|_| FilesError::InvalidKey(staged.key.to_string()))?,
            hash_algorithm: NonEmptyText::new("sha256")
                .map_err(|_| FilesError::InvalidKey(staged.key.to_string()))?,
            hash: NonEmptyText::new(&hash)
                .map_err(|_| FilesError::InvalidKey(staged.key.to_string()))?,
            size_bytes: staged.written,
            media_type,
            stored_at: Utc::now(),
        };

        let metadata_path = self.metadata_path(&staged.key);
        if let Some(parent) = metadata_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&metadata_path, serde_json::to_vec_pretty(&metadata)?)?;

        tracing::info!(key = %staged.key, size = staged.written, "object stored");

        Ok(metadata)
    }

    /// Discards an open upload. Aborting an unknown session is not an error.
    pub fn abort_upload(&self, session_id: &str) -> Result<(), FilesError> {
        let staged = self
            .sessions
            .lock()
            .map_err(|_| FilesError::SessionTablePoisoned)?
            .remove(session_id);

        if let Some(staged) = staged {
            match fs::remove_file(&staged.staging_path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(FilesError::Io(e)),
            }
            tracing::debug!(session = %session_id, key = %staged.key, "upload aborted");
        }
        Ok(())
    }

    /// Returns true if an object is stored under `key`.
    pub fn exists(&self, key: &ObjectKey) -> bool {
        self.object_path(key).is_file()
    }

    /// Reads the metadata written when the object was committed.
    pub fn metadata(&self, key: &ObjectKey) -> Result<ObjectMetadata, FilesError> {
        let path = self.metadata_path(key);
        let bytes = fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FilesError::ObjectNotFound(key.to_string()),
            _ => FilesError::Io(e),
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Reads an object's bytes directly by key.
    pub fn read(&self, key: &ObjectKey) -> Result<Vec<u8>, FilesError> {
        fs::read(self.object_path(key)).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FilesError::ObjectNotFound(key.to_string()),
            _ => FilesError::Io(e),
        })
    }

    /// Issues a signed URL for `key`, valid for the configured TTL.
    ///
    /// # Errors
    ///
    /// Returns `FilesError::ObjectNotFound` if no object is stored under `key`.
    pub fn signed_url(&self, key: &ObjectKey) -> Result<SignedUrl, FilesError> {
        self.signed_url_at(key, Utc::now())
    }

    fn signed_url_at(&self, key: &ObjectKey, now: DateTime<Utc>) -> Result<SignedUrl, FilesError> {
        if !self.exists(key) {
            return Err(FilesError::ObjectNotFound(key.to_string()));
        }

        let expires_at = now + self.url_ttl;
        let expires = expires_at.timestamp();
        let signature = self.sign(key.as_str(), expires);

        Ok(SignedUrl {
            url: format!(
                "{}://{}/{}?expires={}&signature={}",
                SIGNED_URL_SCHEME,
                OBJECTS_DIR_NAME,
                key,
                expires,
                signature
            ),
            // Second precision, matching what the URL carries.
            expires_at: DateTime::<Utc>::from_timestamp(expires, 0).unwrap_or(expires_at),
        })
    }

    /// Verifies a signed URL and returns the object's bytes.
    ///
    /// # Errors
    ///
    /// - `FilesError::InvalidSignedUrl` for malformed URLs or bad signatures
    /// - `FilesError::SignedUrlExpired` once the expiry has passed
    /// - `FilesError::ObjectNotFound` if the object has gone
    pub fn read_signed(&self, url: &str) -> Result<Vec<u8>, FilesError> {
        self.read_signed_at(url, Utc::now())
    }

    fn read_signed_at(&self, url: &str, now: DateTime<Utc>) -> Result<Vec<u8>, FilesError> {
        let key = self.verify_signed_url(url, now)?;
        self.read(&key)
    }

    fn verify_signed_url(&self, url: &str, now: DateTime<Utc>) -> Result<ObjectKey, FilesError> {
        let invalid = || FilesError::InvalidSignedUrl(url.to_owned());

        let prefix = format!("{}://{}/", SIGNED_URL_SCHEME, OBJECTS_DIR_NAME);
        let rest = url.strip_prefix(&prefix).ok_or_else(invalid)?;
        let (key, query) = rest.rsplit_once('?').ok_or_else(invalid)?;

        let mut expires: Option<i64> = None;
        let mut signature: Option<&str> = None;
        for pair in query.split('&') {
            match pair.split_once('=') {
                Some(("expires", v)) => expires = v.parse().ok(),
                Some(("signature", v)) => signature = Some(v),
                _ => return Err(invalid()),
            }
        }
        let expires = expires.ok_or_else(invalid)?;
        let signature = signature.ok_or_else(invalid)?;

        let key = ObjectKey::parse(key).map_err(|_| invalid())?;
        if self.sign(key.as_str(), expires) != signature {
            return Err(invalid());
        }

        let expires_at = DateTime::<Utc>::from_timestamp(expires, 0).ok_or_else(invalid)?;
        if now > expires_at {
            return Err(FilesError::SignedUrlExpired(expires_at));
        }

        Ok(key)
    }

    fn sign(&self, key: &str, expires: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.signing_secret.as_str().as_bytes());
        hasher.update(b"\n");
        hasher.update(key.as_bytes());
        hasher.update(b"\n");
        hasher.update(expires.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    fn object_path(&self, key: &ObjectKey) -> PathBuf {
        key.as_str()
            .split('/')
            .fold(self.root_directory.join(OBJECTS_DIR_NAME), |p, s| p.join(s))
    }

    fn metadata_path(&self, key: &ObjectKey) -> PathBuf {
        let mut path = key
            .as_str()
            .split('/')
            .fold(self.root_directory.join(METADATA_DIR_NAME), |p, s| p.join(s))
            .into_os_string();
        path.push(".json");
        PathBuf::from(path)
    }
}

fn hash_file(path: &Path) -> Result<String, FilesError> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn service(temp: &TempDir) -> FilesService {
        FilesService::new(
            temp.path(),
            NonEmptyText::new("test-secret").unwrap(),
            Duration::seconds(300),
        )
        .unwrap()
    }

    fn upload(service: &FilesService, key: &str, content: &[u8]) -> ObjectMetadata {
        let key = ObjectKey::parse(key).unwrap();
        let session = service.begin_upload(&key, content.len() as u64).unwrap();
        let mut offset = 0u64;
        for chunk in content.chunks(4) {
            offset = service.upload_chunk(&session.id, offset, chunk).unwrap();
        }
        service.finish_upload(&session.id).unwrap()
    }

    #[test]
    fn test_new_rejects_missing_root() {
        let temp = TempDir::new().unwrap();
        let result = FilesService::new(
            &temp.path().join("missing"),
            NonEmptyText::new("s").unwrap(),
            Duration::seconds(1),
        );
        assert!(matches!(result, Err(FilesError::InvalidRootDirectory(_))));
    }

    #[test]
    fn test_object_key_validation() {
        assert!(ObjectKey::parse("owner/1686000000000-scan.pdf").is_ok());
        assert!(ObjectKey::parse("owner/1686000000000-blood test.pdf").is_ok());

        for bad in [
            "",
            "/owner/a.pdf",
            "owner//a.pdf",
            "owner/../a.pdf",
            "owner/./a.pdf",
            "owner/a?.pdf",
            "owner\\a.pdf",
            " owner/a.pdf",
        ] {
            assert!(
                matches!(ObjectKey::parse(bad), Err(FilesError::InvalidKey(_))),
                "expected '{bad}' to be rejected"
            );
        }
    }

    #[test]
    fn test_object_key_file_name() {
        let key = ObjectKey::parse("owner/1686000000000-scan.pdf").unwrap();
        assert_eq!(key.file_name(), "1686000000000-scan.pdf");
    }

    #[test]
    fn test_chunked_upload_commits_object() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);

        let metadata = upload(&service, "owner/1-hello.txt", b"Hello, World!");

        assert_eq!(metadata.size_bytes, 13);
        assert_eq!(metadata.hash_algorithm.as_str(), "sha256");
        assert_eq!(metadata.hash.as_str().len(), 64);

        let key = ObjectKey::parse("owner/1-hello.txt").unwrap();
        assert!(service.exists(&key));
        assert_eq!(service.read(&key).unwrap(), b"Hello, World!");
        assert_eq!(service.metadata(&key).unwrap(), metadata);
    }

    #[test]
    fn test_object_invisible_until_finished() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);
        let key = ObjectKey::parse("owner/1-a.txt").unwrap();

        let session = service.begin_upload(&key, 3).unwrap();
        service.upload_chunk(&session.id, 0, b"ab").unwrap();

        assert!(!service.exists(&key));
        assert_eq!(service.staged_len(&session.id).unwrap(), 2);

        let early = service.finish_upload(&session.id);
        assert!(matches!(
            early,
            Err(FilesError::SizeMismatch {
                declared: 3,
                received: 2
            })
        ));

        // The session survives an early finish and can be resumed.
        service.upload_chunk(&session.id, 2, b"c").unwrap();
        service.finish_upload(&session.id).unwrap();
        assert_eq!(service.read(&key).unwrap(), b"abc");
    }

    #[test]
    fn test_chunk_offset_must_match() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);
        let key = ObjectKey::parse("owner/1-a.txt").unwrap();

        let session = service.begin_upload(&key, 4).unwrap();
        service.upload_chunk(&session.id, 0, b"ab").unwrap();

        let replay = service.upload_chunk(&session.id, 0, b"ab");
        assert!(matches!(
            replay,
            Err(FilesError::OffsetMismatch {
                expected: 2,
                got: 0
            })
        ));
    }

    #[test]
    fn test_chunk_cannot_exceed_declared_size() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);
        let key = ObjectKey::parse("owner/1-a.txt").unwrap();

        let session = service.begin_upload(&key, 2).unwrap();
        let result = service.upload_chunk(&session.id, 0, b"abc");
        assert!(matches!(result, Err(FilesError::SizeMismatch { .. })));
    }

    #[test]
    fn test_objects_are_immutable() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);
        upload(&service, "owner/1-a.txt", b"first");

        let key = ObjectKey::parse("owner/1-a.txt").unwrap();
        let result = service.begin_upload(&key, 6);
        assert!(matches!(result, Err(FilesError::ObjectAlreadyExists(_))));
    }

    #[test]
    fn test_abort_discards_staging() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);
        let key = ObjectKey::parse("owner/1-a.txt").unwrap();

        let session = service.begin_upload(&key, 4).unwrap();
        service.upload_chunk(&session.id, 0, b"ab").unwrap();
        service.abort_upload(&session.id).unwrap();

        assert!(matches!(
            service.staged_len(&session.id),
            Err(FilesError::UnknownSession(_))
        ));
        let staging = temp.path().join(STAGING_DIR_NAME);
        assert_eq!(fs::read_dir(staging).unwrap().count(), 0);

        // Aborting twice is harmless.
        service.abort_upload(&session.id).unwrap();
    }

    #[test]
    fn test_media_type_sniffed() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);
        let png_header = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

        let metadata = upload(&service, "owner/1-scan.png", &png_header);
        assert_eq!(
            metadata.media_type.as_ref().map(|t| t.as_str()),
            Some("image/png")
        );
    }

    #[test]
    fn test_signed_url_round_trip() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);
        upload(&service, "owner/1-report.pdf", b"%PDF-1.4 test");

        let key = ObjectKey::parse("owner/1-report.pdf").unwrap();
        let signed = service.signed_url(&key).unwrap();

        assert!(signed.url.starts_with("healthrec-files://objects/owner/1-report.pdf?"));
        assert_eq!(service.read_signed(&signed.url).unwrap(), b"%PDF-1.4 test");
    }

    #[test]
    fn test_signed_url_tampering_rejected() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);
        upload(&service, "owner/1-a.pdf", b"a");
        upload(&service, "other/1-b.pdf", b"b");

        let key = ObjectKey::parse("owner/1-a.pdf").unwrap();
        let signed = service.signed_url(&key).unwrap();
        let forged = signed.url.replace("owner/1-a.pdf", "other/1-b.pdf");

        assert!(matches!(
            service.read_signed(&forged),
            Err(FilesError::InvalidSignedUrl(_))
        ));
        assert!(matches!(
            service.read_signed("https://example.com/x"),
            Err(FilesError::InvalidSignedUrl(_))
        ));
    }

    #[test]
    fn test_signed_url_expires() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);
        upload(&service, "owner/1-a.pdf", b"a");

        let key = ObjectKey::parse("owner/1-a.pdf").unwrap();
        let issued_at = Utc::now();
        let signed = service.signed_url_at(&key, issued_at).unwrap();

        let later = issued_at + Duration::seconds(301);
        assert!(matches!(
            service.read_signed_at(&signed.url, later),
            Err(FilesError::SignedUrlExpired(_))
        ));
    }

    #[test]
    fn test_signed_url_requires_object() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);
        let key = ObjectKey::parse("owner/1-missing.pdf").unwrap();
        assert!(matches!(
            service.signed_url(&key),
            Err(FilesError::ObjectNotFound(_))
        ));
    }
}
