//! Turns a stored upload into a document record.
//!
//! The request names the owner and the stored file name; together they form the storage key
//! `{user_id}/{file_name}`. The record is derived from the object's metadata and the file name:
//!
//! - category from keywords in the name (`blood`, `xray`/`x-ray`, `mri`, `note`)
//! - type from the sniffed content type (`pdf`, `image`, otherwise `other`)
//! - original name is the stored name without its `<timestamp>-` prefix
//! - patient name is the owner's display name, read from `accounts.yaml` on every request
//! - test and upload dates are the day the object was stored

use api_shared::ProcessReq;
use healthrec_core::backends::LocalAuthProvider;
use healthrec_core::ports::DocumentStore;
use healthrec_core::{DocumentRecord, DocumentStatus, QueryError};
use healthrec_files::{FilesError, FilesService, ObjectKey, ObjectMetadata};
use healthrec_uuid::UuidService;
use std::path::PathBuf;
use std::sync::Arc;

pub const UNKNOWN_PATIENT: &str = "Unknown patient";

#[derive(Debug, thiserror::Error)]
pub enum ProcessFailure {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("no stored file named {0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("account lookup failed: {0}")]
    Accounts(String),
    #[error("document store error: {0}")]
    Store(#[from] QueryError),
}

/// Category shown on the timeline, from keywords in the file name.
pub fn categorise(file_name: &str) -> &'static str {
    let name = file_name.to_lowercase();
    if name.contains("blood") {
        "Blood Test"
    } else if name.contains("xray") || name.contains("x-ray") {
        "X-Ray"
    } else if name.contains("mri") {
        "MRI"
    } else if name.contains("note") {
        "Doctor's Note"
    } else {
        "General"
    }
}

/// Strips the `<timestamp>-` prefix the upload pipeline adds to stored names.
pub fn original_name(stored: &str) -> &str {
    match stored.split_once('-') {
        Some((prefix, rest))
            if !prefix.is_empty() && !rest.is_empty() && prefix.chars().all(|c| c.is_ascii_digit()) =>
        {
            rest
        }
        _ => stored,
    }
}

fn document_type(metadata: &ObjectMetadata, name: &str) -> &'static str {
    match metadata.media_type.as_ref().map(|m| m.as_str()) {
        Some("application/pdf") => "pdf",
        Some(mime) if mime.starts_with("image/") => "image",
        _ if name.to_lowercase().ends_with(".pdf") => "pdf",
        _ => "other",
    }
}

pub struct ProcessingService {
    files: Arc<FilesService>,
    documents: Arc<dyn DocumentStore>,
    accounts_dir: PathBuf,
}

impl ProcessingService {
    pub fn new(
        files: Arc<FilesService>,
        documents: Arc<dyn DocumentStore>,
        accounts_dir: PathBuf,
    ) -> Self {
        Self {
            files,
            documents,
            accounts_dir,
        }
    }

    /// Builds and stores the record for `req`.
    pub async fn process(&self, req: &ProcessReq) -> Result<DocumentRecord, ProcessFailure> {
        let user_id = req.user_id.trim();
        let file_name = req.file_name.trim();
        if user_id.is_empty() || user_id.contains('/') || file_name.is_empty() || file_name.contains('/') {
            return Err(ProcessFailure::InvalidRequest(
                "user_id and file_name must be single path segments".into(),
            ));
        }

        let key = ObjectKey::parse(format!("{}/{}", user_id, file_name))
            .map_err(|e| ProcessFailure::InvalidRequest(e.to_string()))?;

        let files = self.files.clone();
        let lookup = key.clone();
        let metadata = tokio::task::spawn_blocking(move || files.metadata(&lookup))
            .await
            .map_err(|e| ProcessFailure::Storage(e.to_string()))?
            .map_err(|e| match e {
                FilesError::ObjectNotFound(k) => ProcessFailure::NotFound(k),
                other => ProcessFailure::Storage(other.to_string()),
            })?;

        let patient_name = self.patient_name(user_id).await?;
        let record = build_record(&key, &metadata, user_id, patient_name);
        self.documents.insert(&record).await?;

        tracing::info!(
            id = %record.id,
            owner = %record.user_id,
            category = %record.category,
            "document processed"
        );
        Ok(record)
    }

    async fn patient_name(&self, user_id: &str) -> Result<String, ProcessFailure> {
        let dir = self.accounts_dir.clone();
        let id = user_id.to_owned();
        let name = tokio::task::spawn_blocking(move || LocalAuthProvider::lookup_display_name(&dir, &id))
            .await
            .map_err(|e| ProcessFailure::Accounts(e.to_string()))?
            .map_err(|e| ProcessFailure::Accounts(e.to_string()))?;
        Ok(name.unwrap_or_else(|| UNKNOWN_PATIENT.to_owned()))
    }
}

fn build_record(
    key: &ObjectKey,
    metadata: &ObjectMetadata,
    user_id: &str,
    patient_name: String,
) -> DocumentRecord {
    let stored_name = key.file_name();
    let original = original_name(stored_name);

    DocumentRecord {
        id: UuidService::new().to_string(),
        category: categorise(original).to_owned(),
        doc_type: document_type(metadata, original).to_owned(),
        file_name: stored_name.to_owned(),
        original_file_name: original.to_owned(),
        patient_name,
        status: DocumentStatus::Active,
        storage_path: key.as_str().to_owned(),
        test_date: metadata.stored_at.date_naive(),
        upload_date: metadata.stored_at,
        user_id: user_id.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorise_keywords() {
        assert_eq!(categorise("Blood_results.pdf"), "Blood Test");
        assert_eq!(categorise("chest-XRAY.png"), "X-Ray");
        assert_eq!(categorise("knee x-ray.jpg"), "X-Ray");
        assert_eq!(categorise("brain_mri.pdf"), "MRI");
        assert_eq!(categorise("gp note.pdf"), "Doctor's Note");
        assert_eq!(categorise("scan.pdf"), "General");
    }

    #[test]
    fn test_original_name_strips_timestamp() {
        assert_eq!(original_name("1686000000000-report.pdf"), "report.pdf");
        assert_eq!(original_name("1686000000000-x-ray.png"), "x-ray.png");
        assert_eq!(original_name("x-ray.png"), "x-ray.png");
        assert_eq!(original_name("1686000000000-"), "1686000000000-");
    }
}
