//! Service layer modules for destination integrations.
//!
//! Contains the backend abstraction plus its two implementations: the
//! Drive/Sheets client and the in-memory recording backend.

pub mod backend;
pub mod google;
pub mod memory;

pub use backend::{AssessmentBackend, BackendError, DocumentHandle};
pub use google::GoogleBackend;
pub use memory::MemoryBackend;
