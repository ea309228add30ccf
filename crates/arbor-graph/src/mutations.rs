//! Write operations on a transaction.

use serde_json::Value;
use uuid::Uuid;

use crate::client::GraphError;
use crate::state::{EdgeId, Mutation, VertexId};
use crate::transaction::Transaction;

impl Transaction {
    /// Add a vertex of `kind` with the given global identity.
    ///
    /// Fails with [`GraphError::DuplicateUuid`] if the identity is already
    /// used by a vertex visible to this transaction, or at commit if another
    /// transaction claimed it first.
    pub fn add_vertex(&mut self, kind: &str, uuid: Uuid) -> Result<VertexId, GraphError> {
        if self.state.vertex_by_uuid(&uuid).is_some() {
            return Err(GraphError::DuplicateUuid(uuid));
        }
        let id = self.db.allocate_vertex_id();
        self.record(Mutation::AddVertex {
            id,
            kind: kind.to_string(),
            uuid,
        })?;
        Ok(id)
    }

    pub fn set_property(
        &mut self,
        vertex: VertexId,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<(), GraphError> {
        self.record(Mutation::SetProperty {
            vertex,
            key: key.to_string(),
            value: value.into(),
        })
    }

    pub fn remove_property(&mut self, vertex: VertexId, key: &str) -> Result<(), GraphError> {
        self.record(Mutation::RemoveProperty {
            vertex,
            key: key.to_string(),
        })
    }

    /// Remove a vertex and every edge incident to it.
    pub fn remove_vertex(&mut self, vertex: VertexId) -> Result<(), GraphError> {
        self.record(Mutation::RemoveVertex { vertex })
    }

    /// Add an edge `out_vertex -[label]-> in_vertex`.
    pub fn add_edge(
        &mut self,
        label: &str,
        out_vertex: VertexId,
        in_vertex: VertexId,
    ) -> Result<EdgeId, GraphError> {
        let id = self.db.allocate_edge_id();
        self.record(Mutation::AddEdge {
            id,
            label: label.to_string(),
            out_vertex,
            in_vertex,
        })?;
        Ok(id)
    }

    pub fn remove_edge(&mut self, edge: EdgeId) -> Result<(), GraphError> {
        self.record(Mutation::RemoveEdge { edge })
    }
}
