//! Search-index dispatch.
//!
//! Workflows hand back a [`SearchQueueBatch`]; after the storage transaction
//! committed, the caller pushes it into a [`SearchQueue`]. A tokio worker
//! drains the queue and applies each operation to a [`SearchIndexHandler`],
//! prefixing index names with the configured deployment prefix. Handler
//! failures are logged and counted; the queue does not retry them.

use std::sync::{Arc, Mutex};

use arbor_core::{IndexOperation, SearchQueueBatch};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Receiver of index operations, e.g. a search engine client.
pub trait SearchIndexHandler: Send + Sync + 'static {
    fn apply(&self, operation: &IndexOperation) -> anyhow::Result<()>;
}

/// Counters of a dispatch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub batches: usize,
    pub applied: usize,
    pub failed: usize,
}

impl DispatchStats {
    fn add(&mut self, other: DispatchStats) {
        self.batches += other.batches;
        self.applied += other.applied;
        self.failed += other.failed;
    }
}

/// Apply every operation of `batch` in order. A failing operation does not
/// stop the rest of the batch.
pub fn process_batch(
    handler: &dyn SearchIndexHandler,
    batch: SearchQueueBatch,
    prefix: Option<&str>,
) -> DispatchStats {
    let batch_id = batch.id;
    let mut stats = DispatchStats {
        batches: 1,
        ..Default::default()
    };
    for operation in batch.into_operations() {
        let operation = operation.with_prefix(prefix);
        match handler.apply(&operation) {
            Ok(()) => stats.applied += 1,
            Err(e) => {
                tracing::warn!(
                    batch = %batch_id,
                    index = %operation.index(),
                    error = %e,
                    "Search index operation failed"
                );
                stats.failed += 1;
            }
        }
    }
    tracing::debug!(batch = %batch_id, applied = stats.applied, failed = stats.failed, "Batch dispatched");
    stats
}

/// Bounded queue feeding one dispatch worker.
pub struct SearchQueue {
    sender: mpsc::Sender<SearchQueueBatch>,
    worker: JoinHandle<DispatchStats>,
}

impl SearchQueue {
    /// Start the worker on the current tokio runtime.
    pub fn spawn(
        handler: Arc<dyn SearchIndexHandler>,
        prefix: Option<String>,
        capacity: usize,
    ) -> Self {
        let (sender, mut receiver) = mpsc::channel::<SearchQueueBatch>(capacity.max(1));
        let worker = tokio::spawn(async move {
            let mut stats = DispatchStats::default();
            while let Some(batch) = receiver.recv().await {
                stats.add(process_batch(handler.as_ref(), batch, prefix.as_deref()));
            }
            tracing::info!(
                batches = stats.batches,
                applied = stats.applied,
                failed = stats.failed,
                "Search queue drained"
            );
            stats
        });
        Self { sender, worker }
    }

    /// Queue a batch, waiting while the queue is full. Empty batches are
    /// skipped.
    pub async fn enqueue(&self, batch: SearchQueueBatch) -> anyhow::Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.sender
            .send(batch)
            .await
            .map_err(|_| anyhow::anyhow!("search queue worker has stopped"))
    }

    /// Close the queue and wait until every queued batch was applied.
    pub async fn shutdown(self) -> anyhow::Result<DispatchStats> {
        drop(self.sender);
        Ok(self.worker.await?)
    }
}

// ── Handlers ─────────────────────────────────────────────────────

/// Logs every operation. Used where no search engine is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingIndex;

impl SearchIndexHandler for LoggingIndex {
    fn apply(&self, operation: &IndexOperation) -> anyhow::Result<()> {
        match operation {
            IndexOperation::CreateDocument {
                index,
                document_id,
                kind,
            } => tracing::info!(%index, document = %document_id, %kind, "Index document created"),
            IndexOperation::UpdateDocument {
                index,
                document_id,
                kind,
            } => tracing::info!(%index, document = %document_id, %kind, "Index document updated"),
            IndexOperation::DeleteDocument { index, document_id } => {
                tracing::info!(%index, document = %document_id, "Index document deleted")
            }
            IndexOperation::DropIndex { index } => tracing::info!(%index, "Index dropped"),
        }
        Ok(())
    }
}

/// Keeps every applied operation in memory.
#[derive(Debug, Default)]
pub struct RecordingIndex {
    operations: Mutex<Vec<IndexOperation>>,
}

impl RecordingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operations(&self) -> Vec<IndexOperation> {
        match self.operations.lock() {
            Ok(ops) => ops.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl SearchIndexHandler for RecordingIndex {
    fn apply(&self, operation: &IndexOperation) -> anyhow::Result<()> {
        self.operations
            .lock()
            .map_err(|_| anyhow::anyhow!("recording index lock poisoned"))?
            .push(operation.clone());
        Ok(())
    }
}
