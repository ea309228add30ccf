//! Search index operations produced by store workflows.
//!
//! Create and delete workflows collect the index changes they imply into a
//! [`SearchQueueBatch`] and hand it back to the caller. The caller dispatches
//! the batch after the storage transaction committed. A crash between commit
//! and dispatch leaves the search index stale until the affected elements are
//! re-indexed; the store does not track dispatch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ElementId, ElementKind};

/// Unique identifier for a batch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct BatchId(pub Uuid);

impl BatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single pending change to the search index, tagged by action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum IndexOperation {
    CreateDocument {
        index: String,
        document_id: ElementId,
        kind: ElementKind,
    },
    UpdateDocument {
        index: String,
        document_id: ElementId,
        kind: ElementKind,
    },
    DeleteDocument {
        index: String,
        document_id: ElementId,
    },
    DropIndex {
        index: String,
    },
}

impl IndexOperation {
    pub fn index(&self) -> &str {
        match self {
            Self::CreateDocument { index, .. }
            | Self::UpdateDocument { index, .. }
            | Self::DeleteDocument { index, .. }
            | Self::DropIndex { index } => index,
        }
    }

    /// The same operation targeting the prefixed index name.
    pub fn with_prefix(mut self, prefix: Option<&str>) -> Self {
        let renamed = prefixed_index_name(prefix, self.index());
        match &mut self {
            Self::CreateDocument { index, .. }
            | Self::UpdateDocument { index, .. }
            | Self::DeleteDocument { index, .. }
            | Self::DropIndex { index } => *index = renamed,
        }
        self
    }
}

/// Index name with the deployment's prefix applied, if one is configured.
pub fn prefixed_index_name(prefix: Option<&str>, index: &str) -> String {
    match prefix {
        Some(p) if !p.is_empty() => format!("{p}{index}"),
        _ => index.to_string(),
    }
}

/// An ordered batch of pending index operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQueueBatch {
    pub id: BatchId,
    pub created_at: DateTime<Utc>,
    operations: Vec<IndexOperation>,
}

impl SearchQueueBatch {
    pub fn new() -> Self {
        Self {
            id: BatchId::new(),
            created_at: Utc::now(),
            operations: Vec::new(),
        }
    }

    pub fn create_document(&mut self, index: &str, document_id: ElementId, kind: ElementKind) {
        self.operations.push(IndexOperation::CreateDocument {
            index: index.to_string(),
            document_id,
            kind,
        });
    }

    pub fn update_document(&mut self, index: &str, document_id: ElementId, kind: ElementKind) {
        self.operations.push(IndexOperation::UpdateDocument {
            index: index.to_string(),
            document_id,
            kind,
        });
    }

    pub fn delete_document(&mut self, index: &str, document_id: ElementId) {
        self.operations.push(IndexOperation::DeleteDocument {
            index: index.to_string(),
            document_id,
        });
    }

    pub fn drop_index(&mut self, index: &str) {
        self.operations.push(IndexOperation::DropIndex {
            index: index.to_string(),
        });
    }

    /// Append all operations of `other`, preserving order.
    pub fn extend(&mut self, other: SearchQueueBatch) {
        self.operations.extend(other.operations);
    }

    pub fn operations(&self) -> &[IndexOperation] {
        &self.operations
    }

    pub fn into_operations(self) -> Vec<IndexOperation> {
        self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl Default for SearchQueueBatch {
    fn default() -> Self {
        Self::new()
    }
}
