//! Read-only document store capability and an in-memory implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::path::Path;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Document store unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to read documents from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid document data: {0}")]
    Json(#[from] serde_json::Error),
}

/// A document known to the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub path: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Document {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            tags: Vec::new(),
            title: None,
        }
    }

    /// Tags match with or without a leading `#`; `chemical` also matches
    /// nested tags such as `chemical/acid`
    pub fn has_tag(&self, tag: &str) -> bool {
        let wanted = tag.trim_start_matches('#');
        self.tags.iter().any(|t| {
            let t = t.trim_start_matches('#');
            t == wanted || t.strip_prefix(wanted).is_some_and(|rest| rest.starts_with('/'))
        })
    }

    /// Title, else the file name without extension
    pub fn default_display_name(&self) -> String {
        if let Some(title) = &self.title {
            return title.clone();
        }
        Path::new(&self.path)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.clone())
    }
}

/// Host repository of structured documents. The engine only reads from it.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Documents carrying `tag`, in store order
    async fn list_documents_by_tag(&self, tag: &str) -> StoreResult<Vec<Document>>;

    /// Structured metadata of the document at `path`, if it exists
    async fn get_structured_metadata(&self, path: &str) -> StoreResult<Option<Json>>;

    async fn resolve_display_name(&self, document: &Document) -> String {
        document.default_display_name()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    #[serde(flatten)]
    pub document: Document,
    #[serde(default)]
    pub metadata: Json,
}

/// Document store backed by a vector, for tests and headless runs
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    documents: Vec<StoredDocument>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON array of `{ "path", "tags", "title"?, "metadata" }`
    pub fn from_json_str(source: &str) -> StoreResult<Self> {
        let documents: Vec<StoredDocument> = serde_json::from_str(source)?;
        Ok(Self { documents })
    }

    pub async fn load(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let source = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| StoreError::Io {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_json_str(&source)
    }

    pub fn insert(&mut self, document: Document, metadata: Json) {
        self.documents.retain(|d| d.document.path != document.path);
        self.documents.push(StoredDocument { document, metadata });
    }

    pub fn with_document(mut self, path: &str, tags: &[&str], metadata: Json) -> Self {
        let mut document = Document::new(path);
        document.tags = tags.iter().map(|t| t.to_string()).collect();
        self.insert(document, metadata);
        self
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Look a document up by exact path, or by path without the `.md`
    /// extension
    fn find(&self, path: &str) -> Option<&StoredDocument> {
        self.documents.iter().find(|d| {
            d.document.path == path || d.document.path.strip_suffix(".md") == Some(path)
        })
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_documents_by_tag(&self, tag: &str) -> StoreResult<Vec<Document>> {
        Ok(self
            .documents
            .iter()
            .filter(|d| d.document.has_tag(tag))
            .map(|d| d.document.clone())
            .collect())
    }

    async fn get_structured_metadata(&self, path: &str) -> StoreResult<Option<Json>> {
        Ok(self.find(path).map(|d| d.metadata.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tag_matching() {
        let mut doc = Document::new("chemicals/hcl.md");
        doc.tags = vec!["#chemical/acid".to_string(), "lab".to_string()];
        assert!(doc.has_tag("chemical"));
        assert!(doc.has_tag("#lab"));
        assert!(!doc.has_tag("chem"));
        assert!(!doc.has_tag("acid"));
    }

    #[test]
    fn test_display_name() {
        let mut doc = Document::new("chemicals/hcl.md");
        assert_eq!(doc.default_display_name(), "hcl");
        doc.title = Some("Hydrochloric acid".to_string());
        assert_eq!(doc.default_display_name(), "Hydrochloric acid");
    }

    #[tokio::test]
    async fn test_memory_store_from_json() {
        let store = MemoryStore::from_json_str(
            r#"[
                { "path": "chemicals/hcl.md", "tags": ["chemical"], "metadata": { "formula": "HCl" } },
                { "path": "notes/todo.md", "tags": ["note"] }
            ]"#,
        )
        .unwrap();

        let chemicals = store.list_documents_by_tag("chemical").await.unwrap();
        assert_eq!(chemicals.len(), 1);
        assert_eq!(store.resolve_display_name(&chemicals[0]).await, "hcl");

        let metadata = store.get_structured_metadata("chemicals/hcl").await.unwrap();
        assert_eq!(metadata, Some(json!({ "formula": "HCl" })));
        assert_eq!(store.get_structured_metadata("missing.md").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_insert_replaces_same_path() {
        let store = MemoryStore::new()
            .with_document("a.md", &["x"], json!({ "v": 1 }))
            .with_document("a.md", &["x"], json!({ "v": 2 }));
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get_structured_metadata("a.md").await.unwrap(),
            Some(json!({ "v": 2 }))
        );
    }
}
