//! Optimistic transactions.
//!
//! A transaction sees the committed state as of [`Database::begin`] plus its
//! own writes. Nothing it does is visible to others until [`commit`]. Dropping
//! an uncommitted transaction discards its writes.
//!
//! [`Database::begin`]: crate::Database::begin
//! [`commit`]: Transaction::commit

use crate::client::{Database, GraphError};
use crate::state::{GraphState, Mutation};

pub struct Transaction {
    pub(crate) db: Database,
    base_version: u64,
    pub(crate) state: GraphState,
    log: Vec<Mutation>,
    finished: bool,
}

impl Transaction {
    pub(crate) fn new(db: Database, base_version: u64, state: GraphState) -> Self {
        Self {
            db,
            base_version,
            state,
            log: Vec::new(),
            finished: false,
        }
    }

    /// The database this transaction belongs to.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Whether the transaction holds uncommitted writes.
    pub fn is_dirty(&self) -> bool {
        !self.log.is_empty()
    }

    /// Publish all writes atomically.
    pub fn commit(mut self) -> Result<(), GraphError> {
        self.finished = true;
        if self.log.is_empty() {
            return Ok(());
        }
        let log = std::mem::take(&mut self.log);
        let state = std::mem::take(&mut self.state);
        match self.db.commit_state(self.base_version, state, &log) {
            Ok(version) => {
                tracing::debug!(version, mutations = log.len(), "Transaction committed");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, mutations = log.len(), "Transaction commit failed");
                Err(e)
            }
        }
    }

    /// Discard all writes.
    pub fn rollback(mut self) {
        self.finished = true;
        if !self.log.is_empty() {
            tracing::debug!(mutations = self.log.len(), "Transaction rolled back");
        }
    }

    /// Apply `mutation` to the working state and log it for commit.
    pub(crate) fn record(&mut self, mutation: Mutation) -> Result<(), GraphError> {
        self.state.apply(&mutation)?;
        self.log.push(mutation);
        Ok(())
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.finished && !self.log.is_empty() {
            tracing::debug!(
                mutations = self.log.len(),
                "Transaction dropped without commit, rolling back"
            );
        }
    }
}
