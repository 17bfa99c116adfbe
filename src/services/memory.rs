//! In-memory backend
//!
//! Records every operation instead of calling the Drive/Sheets APIs. Used
//! as the test double for the pipeline and selectable via `BACKEND=memory`
//! as a dry-run mode, replacing the env-driven mock branching the service
//! grew up with.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::backend::{AssessmentBackend, BackendError, DocumentHandle};
use crate::pipeline::commit::WriteBatch;

#[derive(Default)]
struct State {
    /// Folder name -> id, plus a resolution counter per name.
    folders: HashMap<String, String>,
    folder_hits: HashMap<String, u32>,
    /// Document name -> applied batches.
    documents: HashMap<String, Vec<WriteBatch>>,
    /// Ordered operation log, for assertions on sequencing.
    operations: Vec<String>,
    fail_uploads: HashSet<String>,
    hang_uploads: HashSet<String>,
    fail_folders: bool,
}

/// Backend that persists nothing beyond process memory.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Failure injection & inspection (used by tests and nothing else,
    // but kept unconditionally compiled so the dry-run mode ships them).
    // ------------------------------------------------------------------

    /// Make uploads of this file name fail with an API error.
    pub fn fail_upload_of(&self, name: &str) {
        self.state.lock().fail_uploads.insert(name.to_string());
    }

    /// Make uploads of this file name hang until cancelled.
    pub fn hang_upload_of(&self, name: &str) {
        self.state.lock().hang_uploads.insert(name.to_string());
    }

    /// Make folder resolution fail for the whole backend.
    pub fn fail_folder_resolution(&self) {
        self.state.lock().fail_folders = true;
    }

    /// How many times `ensure_folder` was called for this name.
    pub fn folder_resolutions(&self, name: &str) -> u32 {
        self.state
            .lock()
            .folder_hits
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    /// The ordered operation log.
    pub fn operations(&self) -> Vec<String> {
        self.state.lock().operations.clone()
    }

    /// Batches applied to the named document, in application order.
    pub fn document_batches(&self, name: &str) -> Option<Vec<WriteBatch>> {
        self.state.lock().documents.get(name).cloned()
    }

    pub fn document_exists(&self, name: &str) -> bool {
        self.state.lock().documents.contains_key(name)
    }
}

#[async_trait]
impl AssessmentBackend for MemoryBackend {
    async fn ensure_folder(&self, name: &str) -> Result<String, BackendError> {
        let mut state = self.state.lock();
        state.operations.push(format!("ensure_folder:{name}"));
        *state.folder_hits.entry(name.to_string()).or_insert(0) += 1;

        if state.fail_folders {
            return Err(BackendError::Unavailable("folder store offline".to_string()));
        }

        let id = state
            .folders
            .entry(name.to_string())
            .or_insert_with(|| format!("folder-{}", Uuid::new_v4()))
            .clone();
        Ok(id)
    }

    async fn upload_file(
        &self,
        folder_id: &str,
        name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, BackendError> {
        let hang = self.state.lock().hang_uploads.contains(name);
        if hang {
            std::future::pending::<()>().await;
        }

        let mut state = self.state.lock();
        state.operations.push(format!("upload:{folder_id}/{name}"));

        if state.fail_uploads.contains(name) {
            return Err(BackendError::Api {
                service: "drive",
                status: 500,
                message: format!("injected failure for {name}"),
            });
        }

        debug!(name, mime_type, size = bytes.len(), "memory upload");
        Ok(format!("memory://{folder_id}/{name}"))
    }

    async fn delete_document_by_name(&self, name: &str) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.operations.push(format!("delete:{name}"));
        state.documents.remove(name);
        Ok(())
    }

    async fn create_document(&self, name: &str) -> Result<DocumentHandle, BackendError> {
        let mut state = self.state.lock();
        state.operations.push(format!("create:{name}"));
        state.documents.insert(name.to_string(), Vec::new());
        Ok(DocumentHandle {
            document_id: name.to_string(),
            url: format!("memory://documents/{name}"),
        })
    }

    async fn apply_batch(
        &self,
        document: &DocumentHandle,
        batch: &WriteBatch,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state
            .operations
            .push(format!("apply:{}", document.document_id));
        state
            .documents
            .get_mut(&document.document_id)
            .ok_or_else(|| BackendError::NotFound(format!("document {}", document.document_id)))?
            .push(batch.clone());
        Ok(())
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        Ok(())
    }
}
