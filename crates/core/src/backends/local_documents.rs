//! Document store keeping one JSON file per record under `<root>/<owner>/<record id>.json`.

use crate::documents::{DocumentQuery, DocumentRecord};
use crate::error::QueryError;
use crate::ports::DocumentStore;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct LocalDocumentStore {
    root: PathBuf,
}

impl LocalDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn owner_dir(&self, owner: &str) -> Result<PathBuf, QueryError> {
        if !is_safe_segment(owner) {
            return Err(QueryError::InvalidOwner(owner.to_owned()));
        }
        Ok(self.root.join(owner))
    }
}

/// True if `segment` can be used as a single path component.
fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment.trim() == segment
        && !segment
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_control())
}

#[async_trait]
impl DocumentStore for LocalDocumentStore {
    async fn query(&self, query: &DocumentQuery) -> Result<Vec<DocumentRecord>, QueryError> {
        let dir = self.owner_dir(&query.owner)?;

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let contents = tokio::fs::read_to_string(&path).await?;
            match serde_json::from_str::<DocumentRecord>(&contents) {
                Ok(record) if query.matches(&record) => records.push(record),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), "skipping unreadable document record: {}", e)
                }
            }
        }

        query.sort(&mut records);
        Ok(records)
    }

    async fn insert(&self, record: &DocumentRecord) -> Result<(), QueryError> {
        let dir = self.owner_dir(&record.user_id)?;
        if !is_safe_segment(&record.id) {
            return Err(QueryError::Store(format!("invalid record id: {}", record.id)));
        }

        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(format!("{}.json", record.id));
        if tokio::fs::try_exists(&path).await? {
            return Err(QueryError::Store(format!(
                "record already exists: {}",
                record.id
            )));
        }

        let json =
            serde_json::to_string_pretty(record).map_err(|e| QueryError::Store(e.to_string()))?;
        tokio::fs::write(&path, json).await?;

        tracing::info!(id = %record.id, owner = %record.user_id, "document record stored");
        Ok(())
    }
}
