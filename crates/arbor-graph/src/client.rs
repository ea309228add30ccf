//! In-process graph database handle.
//!
//! A [`Database`] owns the committed graph state. Writers work on private
//! structurally shared copies inside a [`Transaction`] and publish them on
//! commit. Commits are
//! serialised under one write lock; a transaction whose base state was
//! overtaken by another commit is replayed against the newer state and
//! fails with [`GraphError::Conflict`] if any of its writes no longer apply.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use uuid::Uuid;

use crate::state::{EdgeId, GraphState, Mutation, Snapshot, VertexId};
use crate::transaction::Transaction;

/// Errors from graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Vertex not found: {0}")]
    VertexNotFound(VertexId),

    #[error("Edge not found: {0}")]
    EdgeNotFound(EdgeId),

    #[error("Element identity already in use: {0}")]
    DuplicateUuid(Uuid),

    #[error("No edge index registered for label {0}")]
    MissingIndex(String),

    #[error("Write conflict: {0}")]
    Conflict(String),

    #[error("No snapshot path configured")]
    NoSnapshotPath,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Database settings.
#[derive(Debug, Clone, Default)]
pub struct GraphConfig {
    /// JSON snapshot loaded by [`Database::open`] and written by
    /// [`Database::save_snapshot`].
    pub snapshot_path: Option<PathBuf>,
    pub pretty_snapshots: bool,
}

impl GraphConfig {
    pub fn with_snapshot(path: impl Into<PathBuf>) -> Self {
        Self {
            snapshot_path: Some(path.into()),
            pretty_snapshots: false,
        }
    }
}

struct Committed {
    version: u64,
    state: GraphState,
}

struct Inner {
    config: GraphConfig,
    committed: RwLock<Committed>,
    next_vertex: AtomicU64,
    next_edge: AtomicU64,
}

/// Shared handle to one graph. Cloning is cheap.
#[derive(Clone)]
pub struct Database {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("config", &self.inner.config)
            .field("version", &self.version())
            .finish()
    }
}

impl Database {
    /// Create an empty database.
    pub fn new(config: GraphConfig) -> Self {
        Self::with_state(config, GraphState::default())
    }

    /// Open a database, loading the configured snapshot if the file exists.
    pub fn open(config: GraphConfig) -> Result<Self, GraphError> {
        let state = match config.snapshot_path.as_deref() {
            Some(path) if path.exists() => {
                let bytes = std::fs::read(path)?;
                let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
                let state = GraphState::from_snapshot(snapshot)?;
                tracing::info!(
                    path = %path.display(),
                    vertices = state.vertex_count(),
                    edges = state.edge_count(),
                    "Loaded graph snapshot"
                );
                state
            }
            Some(path) => {
                tracing::info!(path = %path.display(), "No snapshot found, starting empty");
                GraphState::default()
            }
            None => GraphState::default(),
        };
        Ok(Self::with_state(config, state))
    }

    fn with_state(config: GraphConfig, state: GraphState) -> Self {
        let (max_vertex, max_edge) = state.max_ids();
        Self {
            inner: Arc::new(Inner {
                config,
                committed: RwLock::new(Committed { version: 0, state }),
                next_vertex: AtomicU64::new(max_vertex + 1),
                next_edge: AtomicU64::new(max_edge + 1),
            }),
        }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.inner.config
    }

    /// Number of commits since the database was opened.
    pub fn version(&self) -> u64 {
        self.committed().version
    }

    // ── Transactions ─────────────────────────────────────────────

    /// Begin a transaction on a private copy of the committed state. The copy
    /// shares structure with the committed state, so this is O(1).
    pub fn begin(&self) -> Transaction {
        let (version, state) = {
            let committed = self.committed();
            (committed.version, committed.state.clone())
        };
        Transaction::new(self.clone(), version, state)
    }

    /// Run `f` in a transaction. Commits on `Ok`, rolls back on `Err`.
    pub fn tx<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Transaction) -> Result<T, E>,
        E: From<GraphError>,
    {
        let mut tx = self.begin();
        match f(&mut tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                tx.rollback();
                Err(e)
            }
        }
    }

    /// Run `f` against a read-only view of the committed state.
    pub fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction) -> Result<T, E>,
    {
        let tx = self.begin();
        let result = f(&tx);
        tx.rollback();
        result
    }

    // ── Indices ──────────────────────────────────────────────────

    /// Register an edge index for `label`. Existing edges are indexed
    /// immediately; transactions begun earlier pick the index up at commit.
    pub fn create_edge_index(&self, label: &str) {
        let mut committed = self.committed_mut();
        if committed.state.has_edge_index(label) {
            return;
        }
        committed.state.create_edge_index(label);
        committed.version += 1;
        tracing::debug!(label, "Created edge index");
    }

    pub fn has_edge_index(&self, label: &str) -> bool {
        self.committed().state.has_edge_index(label)
    }

    // ── Snapshots ────────────────────────────────────────────────

    /// Write the committed state to the configured snapshot path.
    pub fn save_snapshot(&self) -> Result<(), GraphError> {
        let path = self
            .inner
            .config
            .snapshot_path
            .clone()
            .ok_or(GraphError::NoSnapshotPath)?;
        self.save_snapshot_to(&path)
    }

    pub fn save_snapshot_to(&self, path: &Path) -> Result<(), GraphError> {
        let snapshot = self.committed().state.to_snapshot();
        let bytes = if self.inner.config.pretty_snapshots {
            serde_json::to_vec_pretty(&snapshot)?
        } else {
            serde_json::to_vec(&snapshot)?
        };

        // Write to a sibling file first so a crash never leaves a torn snapshot.
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, path)?;
        tracing::info!(
            path = %path.display(),
            vertices = snapshot.vertices.len(),
            edges = snapshot.edges.len(),
            "Saved graph snapshot"
        );
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────

    pub(crate) fn allocate_vertex_id(&self) -> VertexId {
        VertexId(self.inner.next_vertex.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn allocate_edge_id(&self) -> EdgeId {
        EdgeId(self.inner.next_edge.fetch_add(1, Ordering::Relaxed))
    }

    /// Publish a transaction's work. Returns the new committed version.
    pub(crate) fn commit_state(
        &self,
        base_version: u64,
        working: GraphState,
        log: &[Mutation],
    ) -> Result<u64, GraphError> {
        let mut committed = self.committed_mut();
        if committed.version == base_version {
            committed.state = working;
        } else {
            let mut merged = committed.state.clone();
            for mutation in log {
                merged.apply(mutation).map_err(|e| match e {
                    GraphError::DuplicateUuid(_) => e,
                    other => GraphError::Conflict(other.to_string()),
                })?;
            }
            committed.state = merged;
        }
        committed.version += 1;
        Ok(committed.version)
    }

    fn committed(&self) -> std::sync::RwLockReadGuard<'_, Committed> {
        self.inner
            .committed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn committed_mut(&self) -> std::sync::RwLockWriteGuard<'_, Committed> {
        self.inner
            .committed
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
