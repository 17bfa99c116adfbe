//! Target writer
//!
//! Translates a [`LayoutPlan`] into batched write directives and commits
//! them against the destination backend: delete any same-named document,
//! create a fresh one, then apply structure (dimensions, merges) before
//! values before formats. Merges must exist before the value that targets a
//! merged anchor cell, and formatting touches merged ranges.
//!
//! The delete/create pair is not transactional; a crash in between leaves
//! the document absent, which a resubmission repairs. Concurrent
//! submissions for the same work order are excluded by a short-lived named
//! lock held for the duration of the commit.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{info, instrument};

use crate::pipeline::layout::{CellFormat, GridRange, LayoutPlan, Payload, RowSpec};
use crate::services::backend::{AssessmentBackend, BackendError, DocumentHandle};

#[derive(Debug, Error)]
pub enum CommitError {
    #[error("a submission for document '{0}' is already in progress")]
    WriteConflict(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

// ============================================================================
// Directive batch
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnWidthUpdate {
    pub col: u32,
    pub width_px: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueWrite {
    pub row: u32,
    pub col: u32,
    pub payload: Payload,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormatWrite {
    pub range: GridRange,
    pub format: CellFormat,
}

/// All directives for one document, grouped by kind so the backend can turn
/// each group into as few API calls as practical. Application order is
/// fixed: dimensions and merges, then values, then formats.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    pub column_widths: Vec<ColumnWidthUpdate>,
    pub row_heights: Vec<RowSpec>,
    pub merges: Vec<GridRange>,
    pub values: Vec<ValueWrite>,
    pub formats: Vec<FormatWrite>,
}

/// Flatten a layout plan into a directive batch. Values land on each
/// region's anchor cell; blank payloads write nothing but still carry their
/// format (borders on empty table cells).
pub fn plan_to_batch(plan: &LayoutPlan) -> WriteBatch {
    let mut batch = WriteBatch {
        column_widths: plan
            .column_widths
            .iter()
            .enumerate()
            .map(|(col, &width_px)| ColumnWidthUpdate {
                col: col as u32,
                width_px,
            })
            .collect(),
        row_heights: plan.row_specs.clone(),
        merges: plan.merges.clone(),
        ..WriteBatch::default()
    };

    for region in &plan.regions {
        if region.payload != Payload::Blank {
            batch.values.push(ValueWrite {
                row: region.range.start_row,
                col: region.range.start_col,
                payload: region.payload.clone(),
            });
        }
        if region.format != CellFormat::default() {
            batch.formats.push(FormatWrite {
                range: region.range,
                format: region.format.clone(),
            });
        }
    }

    batch
}

// ============================================================================
// Document naming
// ============================================================================

/// Maximum length the destination service accepts for a sheet/tab name.
const MAX_NAME_LEN: usize = 100;

/// Strip characters illegal in a sheet/tab name from the work-order
/// identifier. An empty result falls back to a timestamp-derived name.
pub fn sanitize_document_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '\'' | '"' | '[' | ']' | '/' | '\\' | '?' | '*' | ':'))
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        return format!("Assessment {}", Utc::now().format("%Y%m%d-%H%M%S"));
    }

    cleaned.chars().take(MAX_NAME_LEN).collect()
}

// ============================================================================
// Submission locks
// ============================================================================

/// In-process registry of document names with a commit in flight. Guards
/// the delete/create sequence against a concurrent resubmission of the same
/// work order.
#[derive(Clone, Default)]
pub struct SubmissionLocks {
    held: Arc<Mutex<HashSet<String>>>,
}

impl SubmissionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to take the named lock. `None` means another commit holds it.
    pub fn acquire(&self, name: &str) -> Option<SubmissionGuard> {
        let mut held = self.held.lock();
        if !held.insert(name.to_string()) {
            return None;
        }
        Some(SubmissionGuard {
            held: Arc::clone(&self.held),
            name: name.to_string(),
        })
    }
}

/// Releases the named lock on drop.
pub struct SubmissionGuard {
    held: Arc<Mutex<HashSet<String>>>,
    name: String,
}

impl Drop for SubmissionGuard {
    fn drop(&mut self) {
        self.held.lock().remove(&self.name);
    }
}

// ============================================================================
// Commit
// ============================================================================

/// Commit a layout plan as a freshly created document named after the
/// work order. Full-replace semantics: any prior document of the same name
/// is deleted first, so resubmission is idempotent at the document level.
#[instrument(skip(backend, locks, plan), fields(document = %raw_name))]
pub async fn commit(
    backend: &dyn AssessmentBackend,
    locks: &SubmissionLocks,
    plan: &LayoutPlan,
    raw_name: &str,
) -> Result<DocumentHandle, CommitError> {
    let name = sanitize_document_name(raw_name);

    let _guard = locks
        .acquire(&name)
        .ok_or_else(|| CommitError::WriteConflict(name.clone()))?;

    backend.delete_document_by_name(&name).await?;
    let document = backend.create_document(&name).await?;

    let batch = plan_to_batch(plan);
    backend.apply_batch(&document, &batch).await?;

    info!(
        document = %name,
        rows = plan.row_count(),
        values = batch.values.len(),
        merges = batch.merges.len(),
        "worksheet committed"
    );

    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::layout::{CellFormat, Region, RowHeight};

    #[test]
    fn sanitize_strips_illegal_characters() {
        assert_eq!(sanitize_document_name("WO[42]/B:'21'*?"), "WO42B21");
        assert_eq!(sanitize_document_name("  WO-4821 "), "WO-4821");
    }

    #[test]
    fn sanitize_empty_falls_back_to_timestamp() {
        let name = sanitize_document_name("  '[]'  ");
        assert!(name.starts_with("Assessment "));
    }

    #[test]
    fn sanitize_truncates_long_names() {
        let long = "x".repeat(300);
        assert_eq!(sanitize_document_name(&long).len(), 100);
    }

    #[test]
    fn lock_is_exclusive_and_released_on_drop() {
        let locks = SubmissionLocks::new();

        let guard = locks.acquire("WO-1").expect("first acquire");
        assert!(locks.acquire("WO-1").is_none());
        assert!(locks.acquire("WO-2").is_some());

        drop(guard);
        assert!(locks.acquire("WO-1").is_some());
    }

    #[test]
    fn batch_skips_blank_values_but_keeps_their_formats() {
        let plan = LayoutPlan {
            regions: vec![
                Region {
                    range: GridRange::cell(0, 0),
                    payload: Payload::Text("x".to_string()),
                    format: CellFormat::default(),
                },
                Region {
                    range: GridRange::cell(0, 1),
                    payload: Payload::Blank,
                    format: CellFormat {
                        bordered: true,
                        ..CellFormat::default()
                    },
                },
            ],
            merges: vec![],
            row_specs: vec![RowSpec {
                row: 0,
                height: RowHeight::Fixed(22),
            }],
            column_widths: vec![100, 100],
        };

        let batch = plan_to_batch(&plan);
        assert_eq!(batch.values.len(), 1);
        assert_eq!(batch.values[0].col, 0);
        assert_eq!(batch.formats.len(), 1);
        assert_eq!(batch.formats[0].range, GridRange::cell(0, 1));
        assert_eq!(batch.column_widths.len(), 2);
    }
}
