//! Assessment backend abstraction
//!
//! Every side effect of a submission (asset persistence, document
//! delete/create, directive application) goes through this trait. The
//! backend is chosen once, at construction time: [`GoogleBackend`] in
//! production, [`MemoryBackend`] for tests and dry runs.
//!
//! [`GoogleBackend`]: super::google::GoogleBackend
//! [`MemoryBackend`]: super::memory::MemoryBackend

use async_trait::async_trait;
use thiserror::Error;

use crate::pipeline::commit::WriteBatch;

/// Errors surfaced by a backend. Authorization failures are distinct from
/// "not found" so the caller can prompt for re-authentication instead of
/// treating them as data errors.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("invalid asset format: {0}")]
    InvalidAssetFormat(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("{service} API error ({status}): {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },
}

/// Handle to a freshly created spreadsheet document.
#[derive(Debug, Clone)]
pub struct DocumentHandle {
    pub document_id: String,
    pub url: String,
}

/// Destination side of the submission pipeline.
#[async_trait]
pub trait AssessmentBackend: Send + Sync {
    /// Resolve the folder grouping one work order's assets, creating it
    /// under the configured root if absent. Idempotent: repeated calls for
    /// the same name return the same folder.
    async fn ensure_folder(&self, name: &str) -> Result<String, BackendError>;

    /// Persist one file into `folder_id`, grant public read access, and
    /// return a URL usable inside an image-embed formula.
    async fn upload_file(
        &self,
        folder_id: &str,
        name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, BackendError>;

    /// Delete any existing document with this exact name. Absence is not an
    /// error.
    async fn delete_document_by_name(&self, name: &str) -> Result<(), BackendError>;

    /// Create a fresh, empty document named `name`.
    async fn create_document(&self, name: &str) -> Result<DocumentHandle, BackendError>;

    /// Apply one batch of write directives to a document. Implementations
    /// must preserve the batch's internal ordering: structure, then values,
    /// then formats.
    async fn apply_batch(
        &self,
        document: &DocumentHandle,
        batch: &WriteBatch,
    ) -> Result<(), BackendError>;

    /// Cheap reachability probe for the health endpoint.
    async fn health_check(&self) -> Result<(), BackendError>;
}
