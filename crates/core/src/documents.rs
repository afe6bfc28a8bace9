//! Document listing, search, download and preview.
//!
//! The listing fetches one snapshot per session: the current user's active records, newest
//! test date first. Search never modifies that snapshot; every search is computed from it, so
//! widening a search term brings back records a narrower term hid.

use crate::constants::ACTIVE_STATUS;
use crate::error::{DownloadError, QueryError};
use crate::notify::{Notifier, Toast};
use crate::ports::{DocumentStore, ObjectStorage};
use crate::session::{Identity, Session};
use chrono::{DateTime, NaiveDate, Utc};
use healthrec_files::{ObjectKey, SignedUrl};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Active,
    Processing,
    Archived,
    Deleted,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Active => ACTIVE_STATUS,
            DocumentStatus::Processing => "processing",
            DocumentStatus::Archived => "archived",
            DocumentStatus::Deleted => "deleted",
        }
    }
}

/// A document as stored by the processing step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub category: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    /// Stored file name (last segment of the storage key)
    pub file_name: String,
    pub original_file_name: String,
    pub patient_name: String,
    pub status: DocumentStatus,
    pub storage_path: String,
    pub test_date: NaiveDate,
    pub upload_date: DateTime<Utc>,
    /// Owning identity
    pub user_id: String,
}

/// Sort order supported by the document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentOrder {
    TestDateDesc,
}

/// The single query shape issued against the document store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentQuery {
    pub owner: String,
    pub status: DocumentStatus,
    pub order: DocumentOrder,
}

impl DocumentQuery {
    /// Active documents owned by `identity`, newest test date first.
    pub fn active_for(identity: &Identity) -> Self {
        Self {
            owner: identity.id.as_str().to_owned(),
            status: DocumentStatus::Active,
            order: DocumentOrder::TestDateDesc,
        }
    }

    pub fn matches(&self, record: &DocumentRecord) -> bool {
        record.user_id == self.owner && record.status == self.status
    }

    /// Sorts records in this query's order. Ties keep their relative order.
    pub fn sort(&self, records: &mut [DocumentRecord]) {
        match self.order {
            DocumentOrder::TestDateDesc => records.sort_by(|a, b| b.test_date.cmp(&a.test_date)),
        }
    }
}

/// Case-insensitive substring search over category, patient name and test date.
///
/// A blank term matches everything.
pub fn search_documents<'a>(snapshot: &'a [DocumentRecord], term: &str) -> Vec<&'a DocumentRecord> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return snapshot.iter().collect();
    }

    snapshot
        .iter()
        .filter(|doc| {
            doc.category.to_lowercase().contains(&needle)
                || doc.patient_name.to_lowercase().contains(&needle)
                || doc.test_date.format("%Y-%m-%d").to_string().contains(&needle)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewKind {
    Pdf,
    Image,
    Other,
}

impl PreviewKind {
    fn of(record: &DocumentRecord) -> Self {
        let doc_type = record.doc_type.to_lowercase();
        let extension = Path::new(&record.original_file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        if doc_type == "pdf" || extension.as_deref() == Some("pdf") {
            PreviewKind::Pdf
        } else if doc_type == "image" || doc_type.starts_with("image/") {
            PreviewKind::Image
        } else {
            PreviewKind::Other
        }
    }
}

/// What a preview dialog needs to show a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub file_name: String,
    pub url: SignedUrl,
    pub kind: PreviewKind,
}

/// State of the timeline page.
pub struct DocumentListing {
    store: Arc<dyn DocumentStore>,
    storage: Arc<dyn ObjectStorage>,
    notifier: Arc<dyn Notifier>,
    snapshot: Vec<DocumentRecord>,
}

impl DocumentListing {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        storage: Arc<dyn ObjectStorage>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            storage,
            notifier,
            snapshot: Vec::new(),
        }
    }

    /// Fetches the snapshot for `session`.
    ///
    /// Does nothing while the session is loading and clears the listing when nobody is signed
    /// in. Records that are not active or not owned by the signed-in user are dropped even if
    /// the store returns them.
    ///
    /// # Errors
    ///
    /// Returns the store's `QueryError`. The listing is left empty and a generic error toast is
    /// shown; the caller must trigger a new load to try again.
    pub async fn load(&mut self, session: &Session) -> Result<&[DocumentRecord], QueryError> {
        if session.is_loading() {
            return Ok(&self.snapshot);
        }

        let Some(identity) = session.identity() else {
            self.snapshot.clear();
            return Ok(&self.snapshot);
        };

        let query = DocumentQuery::active_for(identity);
        match self.store.query(&query).await {
            Ok(mut records) => {
                let fetched = records.len();
                records.retain(|r| query.matches(r));
                if records.len() != fetched {
                    tracing::warn!(
                        dropped = fetched - records.len(),
                        "document store returned records outside the query"
                    );
                }
                query.sort(&mut records);
                tracing::info!(count = records.len(), "documents loaded");
                self.snapshot = records;
                Ok(&self.snapshot)
            }
            Err(e) => {
                tracing::error!("Error fetching documents: {}", e);
                self.snapshot.clear();
                self.notifier
                    .notify(Toast::error("Error").with_description("Failed to fetch documents"));
                Err(e)
            }
        }
    }

    /// The full fetched snapshot.
    pub fn documents(&self) -> &[DocumentRecord] {
        &self.snapshot
    }

    /// Records matching `term`, computed from the full snapshot.
    pub fn search(&self, term: &str) -> Vec<&DocumentRecord> {
        search_documents(&self.snapshot, term)
    }

    /// Looks a record up by id in the snapshot.
    pub fn find(&self, id: &str) -> Option<&DocumentRecord> {
        self.snapshot.iter().find(|r| r.id == id)
    }

    /// Downloads a record's file into `dest_dir` under its original name.
    ///
    /// A fresh signed URL is resolved for every download. Existing files are not overwritten;
    /// a numbered suffix is added instead.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` after showing an error toast.
    pub async fn download(
        &self,
        record: &DocumentRecord,
        dest_dir: &Path,
    ) -> Result<PathBuf, DownloadError> {
        let result = self.download_inner(record, dest_dir).await;
        match &result {
            Ok(path) => tracing::info!(id = %record.id, path = %path.display(), "document downloaded"),
            Err(e) => {
                tracing::error!("Error downloading file: {}", e);
                self.notifier
                    .notify(Toast::error("Error").with_description("Failed to download file"));
            }
        }
        result
    }

    async fn download_inner(
        &self,
        record: &DocumentRecord,
        dest_dir: &Path,
    ) -> Result<PathBuf, DownloadError> {
        let key = ObjectKey::parse(&record.storage_path)
            .map_err(|_| DownloadError::InvalidPath(record.storage_path.clone()))?;
        let url = self.storage.download_url(&key).await?;
        let bytes = self.storage.fetch(&url).await?;

        let target = unique_target(dest_dir, &save_name(record)).await;
        tokio::fs::write(&target, &bytes)
            .await
            .map_err(DownloadError::Save)?;
        Ok(target)
    }

    /// Resolves what a preview dialog needs for `record`.
    pub async fn preview(&self, record: &DocumentRecord) -> Result<Preview, DownloadError> {
        let key = ObjectKey::parse(&record.storage_path)
            .map_err(|_| DownloadError::InvalidPath(record.storage_path.clone()))?;

        match self.storage.download_url(&key).await {
            Ok(url) => Ok(Preview {
                file_name: record.original_file_name.clone(),
                url,
                kind: PreviewKind::of(record),
            }),
            Err(e) => {
                self.notifier
                    .notify(Toast::error("Error").with_description("Failed to load preview"));
                Err(e.into())
            }
        }
    }
}

/// File name to save a record under; path components in the stored name are ignored.
fn save_name(record: &DocumentRecord) -> String {
    Path::new(&record.original_file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.trim().is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| record.file_name.clone())
}

async fn unique_target(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
        return candidate;
    }

    let path = Path::new(name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
    let extension = path.extension().and_then(|e| e.to_str());

    let mut n = 1u32;
    loop {
        let numbered = match extension {
            Some(ext) => format!("{} ({}).{}", stem, n, ext),
            None => format!("{} ({})", stem, n),
        };
        let candidate = dir.join(numbered);
        if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::local_auth::LocalAccount;
    use crate::backends::local_documents::LocalDocumentStore;
    use crate::backends::local_storage::LocalObjectStorage;
    use crate::notify::{CollectingNotifier, ToastVariant};
    use async_trait::async_trait;
    use healthrec_files::FilesService;
    use healthrec_types::NonEmptyText;
    use tempfile::TempDir;

    fn record(id: &str, category: &str, patient: &str, test_date: &str, owner: &str) -> DocumentRecord {
        DocumentRecord {
            id: id.into(),
            category: category.into(),
            doc_type: "pdf".into(),
            file_name: format!("1686000000000-{}.pdf", id),
            original_file_name: format!("{}.pdf", id),
            patient_name: patient.into(),
            status: DocumentStatus::Active,
            storage_path: format!("{}/1686000000000-{}.pdf", owner, id),
            test_date: test_date.parse().unwrap(),
            upload_date: "2023-06-02T10:00:00Z".parse().unwrap(),
            user_id: owner.into(),
        }
    }

    fn scenario_set() -> Vec<DocumentRecord> {
        vec![
            record("blood", "Blood Test", "Jane Doe", "2023-06-01", "u-jane"),
            record("xray", "X-Ray", "John Doe", "2023-05-15", "u-jane"),
        ]
    }

    fn session_for(owner: &str) -> Session {
        let account =
            LocalAccount::new(owner, &format!("{}@example.com", owner), None, "pw").unwrap();
        Session::settled(Some(account.identity()))
    }

    struct FailingStore;

    #[async_trait]
    impl DocumentStore for FailingStore {
        async fn query(&self, _query: &DocumentQuery) -> Result<Vec<DocumentRecord>, QueryError> {
            Err(QueryError::PermissionDenied)
        }

        async fn insert(&self, _record: &DocumentRecord) -> Result<(), QueryError> {
            Err(QueryError::PermissionDenied)
        }
    }

    /// Store that ignores the query and returns everything it holds.
    struct LeakyStore(Vec<DocumentRecord>);

    #[async_trait]
    impl DocumentStore for LeakyStore {
        async fn query(&self, _query: &DocumentQuery) -> Result<Vec<DocumentRecord>, QueryError> {
            Ok(self.0.clone())
        }

        async fn insert(&self, _record: &DocumentRecord) -> Result<(), QueryError> {
            Ok(())
        }
    }

    fn storage(temp: &TempDir) -> (Arc<FilesService>, Arc<LocalObjectStorage>) {
        let root = temp.path().join("storage");
        std::fs::create_dir_all(&root).unwrap();
        let files = Arc::new(
            FilesService::new(
                &root,
                NonEmptyText::new("secret").unwrap(),
                chrono::Duration::seconds(60),
            )
            .unwrap(),
        );
        (files.clone(), Arc::new(LocalObjectStorage::new(files)))
    }

    #[test]
    fn test_search_scenario_jane() {
        let docs = scenario_set();
        let hits = search_documents(&docs, "jane");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].category, "Blood Test");
    }

    #[test]
    fn test_search_matches_each_field_case_insensitively() {
        let docs = scenario_set();
        assert_eq!(search_documents(&docs, "X-RAY")[0].id, "xray");
        assert_eq!(search_documents(&docs, "2023-05")[0].id, "xray");
        assert_eq!(search_documents(&docs, "doe").len(), 2);
        assert_eq!(search_documents(&docs, "   ").len(), 2);
        assert!(search_documents(&docs, "mri").is_empty());
    }

    #[tokio::test]
    async fn test_broadening_search_restores_records() {
        let temp = TempDir::new().unwrap();
        let (_, storage) = storage(&temp);
        let docs = scenario_set();
        let mut listing = DocumentListing::new(
            Arc::new(LeakyStore(docs.clone())),
            storage,
            Arc::new(CollectingNotifier::new()),
        );
        listing.load(&session_for("u-jane")).await.unwrap();

        let narrow = listing.search("jane");
        assert_eq!(narrow.len(), 1);

        let broad = listing.search("doe");
        assert_eq!(broad, search_documents(&docs, "doe"));
        assert_eq!(broad.len(), 2);
        assert_eq!(listing.documents().len(), 2);
    }

    #[tokio::test]
    async fn test_load_enforces_owner_and_status() {
        let temp = TempDir::new().unwrap();
        let (_, storage) = storage(&temp);

        let mut archived = record("old", "Blood Test", "Jane Doe", "2022-01-01", "u-jane");
        archived.status = DocumentStatus::Archived;
        let mut all = scenario_set();
        all.push(archived);
        all.push(record("other", "MRI", "Sam Roe", "2023-07-01", "u-sam"));

        let mut listing = DocumentListing::new(
            Arc::new(LeakyStore(all)),
            storage,
            Arc::new(CollectingNotifier::new()),
        );

        let docs = listing.load(&session_for("u-jane")).await.unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["blood", "xray"]);
    }

    #[tokio::test]
    async fn test_load_orders_by_test_date_descending() {
        let temp = TempDir::new().unwrap();
        let (_, storage) = storage(&temp);
        let store = Arc::new(LocalDocumentStore::new(temp.path().join("documents")));
        for r in [
            record("a", "Blood Test", "Jane Doe", "2023-01-10", "u-jane"),
            record("b", "X-Ray", "Jane Doe", "2023-06-01", "u-jane"),
            record("c", "Doctor's Note", "Jane Doe", "2023-04-22", "u-jane"),
        ] {
            store.insert(&r).await.unwrap();
        }

        let mut listing =
            DocumentListing::new(store, storage, Arc::new(CollectingNotifier::new()));
        let docs = listing.load(&session_for("u-jane")).await.unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[tokio::test]
    async fn test_load_failure_empties_listing_and_toasts() {
        let temp = TempDir::new().unwrap();
        let (_, storage) = storage(&temp);
        let notifier = Arc::new(CollectingNotifier::new());
        let mut listing = DocumentListing::new(
            Arc::new(LeakyStore(scenario_set())),
            storage.clone(),
            notifier.clone(),
        );
        listing.load(&session_for("u-jane")).await.unwrap();
        assert_eq!(listing.documents().len(), 2);

        listing.store = Arc::new(FailingStore);
        let result = listing.load(&session_for("u-jane")).await;

        assert!(matches!(result, Err(QueryError::PermissionDenied)));
        assert!(listing.documents().is_empty());
        let toasts = notifier.drain();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].variant, ToastVariant::Destructive);
        assert_eq!(toasts[0].description.as_deref(), Some("Failed to fetch documents"));
    }

    #[tokio::test]
    async fn test_load_without_identity_clears() {
        let temp = TempDir::new().unwrap();
        let (_, storage) = storage(&temp);
        let mut listing = DocumentListing::new(
            Arc::new(LeakyStore(scenario_set())),
            storage,
            Arc::new(CollectingNotifier::new()),
        );
        listing.load(&session_for("u-jane")).await.unwrap();

        let docs = listing.load(&Session::settled(None)).await.unwrap();
        assert!(docs.is_empty());

        // A loading session leaves the listing untouched.
        let docs = listing.load(&Session::loading()).await.unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_download_saves_under_original_name() {
        let temp = TempDir::new().unwrap();
        let (files, storage) = storage(&temp);
        let doc = record("blood", "Blood Test", "Jane Doe", "2023-06-01", "u-jane");

        let key = ObjectKey::parse(&doc.storage_path).unwrap();
        let session = files.begin_upload(&key, 9).unwrap();
        files.upload_chunk(&session.id, 0, b"%PDF-data").unwrap();
        files.finish_upload(&session.id).unwrap();

        let listing = DocumentListing::new(
            Arc::new(LeakyStore(vec![doc.clone()])),
            storage,
            Arc::new(CollectingNotifier::new()),
        );
        let out = temp.path().join("downloads");
        std::fs::create_dir_all(&out).unwrap();

        let first = listing.download(&doc, &out).await.unwrap();
        let second = listing.download(&doc, &out).await.unwrap();

        assert_eq!(first, out.join("blood.pdf"));
        assert_eq!(second, out.join("blood (1).pdf"));
        assert_eq!(std::fs::read(&first).unwrap(), b"%PDF-data");
    }

    #[tokio::test]
    async fn test_download_missing_object_reports_error() {
        let temp = TempDir::new().unwrap();
        let (_, storage) = storage(&temp);
        let notifier = Arc::new(CollectingNotifier::new());
        let doc = record("gone", "X-Ray", "Jane Doe", "2023-06-01", "u-jane");
        let listing = DocumentListing::new(
            Arc::new(LeakyStore(vec![doc.clone()])),
            storage,
            notifier.clone(),
        );

        let result = listing.download(&doc, temp.path()).await;

        assert!(matches!(
            result,
            Err(DownloadError::Storage(crate::error::StorageError::NotFound(_)))
        ));
        assert_eq!(
            notifier.drain()[0].description.as_deref(),
            Some("Failed to download file")
        );
    }

    #[tokio::test]
    async fn test_preview_kind_and_url() {
        let temp = TempDir::new().unwrap();
        let (files, storage) = storage(&temp);
        let mut doc = record("scan", "X-Ray", "Jane Doe", "2023-06-01", "u-jane");
        doc.doc_type = "image".into();
        doc.original_file_name = "scan.png".into();
        doc.storage_path = "u-jane/1686000000000-scan.png".into();

        let key = ObjectKey::parse(&doc.storage_path).unwrap();
        let session = files.begin_upload(&key, 1).unwrap();
        files.upload_chunk(&session.id, 0, b"x").unwrap();
        files.finish_upload(&session.id).unwrap();

        let listing = DocumentListing::new(
            Arc::new(LeakyStore(vec![])),
            storage,
            Arc::new(CollectingNotifier::new()),
        );
        let preview = listing.preview(&doc).await.unwrap();

        assert_eq!(preview.kind, PreviewKind::Image);
        assert_eq!(preview.file_name, "scan.png");
        assert!(preview.url.url.contains("u-jane/1686000000000-scan.png"));
    }

    #[test]
    fn test_record_json_uses_type_field() {
        let doc = record("blood", "Blood Test", "Jane Doe", "2023-06-01", "u-jane");
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["type"], "pdf");
        assert_eq!(json["status"], "active");
        assert_eq!(json["test_date"], "2023-06-01");
    }
}
