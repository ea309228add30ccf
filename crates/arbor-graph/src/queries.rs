//! Read operations on a transaction.
//!
//! Reads see the committed state the transaction started from plus its own
//! writes. Adjacency iteration is ordered by edge creation.

use serde_json::Value;
use uuid::Uuid;

use crate::client::GraphError;
use crate::state::{CompositeKey, EdgeId, EdgeRecord, VertexId, VertexRecord};
use crate::transaction::Transaction;

impl Transaction {
    pub fn vertex(&self, id: VertexId) -> Result<&VertexRecord, GraphError> {
        self.state.vertex(id).ok_or(GraphError::VertexNotFound(id))
    }

    pub fn contains_vertex(&self, id: VertexId) -> bool {
        self.state.vertex(id).is_some()
    }

    /// Look a vertex up by global identity, optionally restricted to `kind`.
    pub fn find_vertex(&self, kind: Option<&str>, uuid: &Uuid) -> Option<&VertexRecord> {
        self.state
            .vertex_by_uuid(uuid)
            .filter(|v| kind.map_or(true, |k| v.kind == k))
    }

    /// All vertices of `kind`, ordered by creation.
    pub fn vertices_of_kind(&self, kind: &str) -> Vec<VertexId> {
        self.state.vertex_ids_of_kind(kind).collect()
    }

    /// The oldest vertex of `kind`, found through the kind index.
    pub fn first_vertex_of_kind(&self, kind: &str) -> Option<VertexId> {
        self.state.vertex_ids_of_kind(kind).next()
    }

    pub fn property(&self, vertex: VertexId, key: &str) -> Result<Option<&Value>, GraphError> {
        Ok(self.vertex(vertex)?.properties.get(key))
    }

    pub fn edge(&self, id: EdgeId) -> Result<&EdgeRecord, GraphError> {
        self.state.edge(id).ok_or(GraphError::EdgeNotFound(id))
    }

    // ── Adjacency ────────────────────────────────────────────────

    /// Outgoing edges of `vertex` carrying `label`.
    pub fn out_edges<'a>(
        &'a self,
        vertex: VertexId,
        label: &'a str,
    ) -> impl Iterator<Item = &'a EdgeRecord> + 'a {
        self.state
            .out_edge_ids(vertex)
            .filter_map(move |id| self.state.edge(id))
            .filter(move |e| e.label == label)
    }

    /// Incoming edges of `vertex` carrying `label`.
    pub fn in_edges<'a>(
        &'a self,
        vertex: VertexId,
        label: &'a str,
    ) -> impl Iterator<Item = &'a EdgeRecord> + 'a {
        self.state
            .in_edge_ids(vertex)
            .filter_map(move |id| self.state.edge(id))
            .filter(move |e| e.label == label)
    }

    /// Every edge touching `vertex`, in either direction.
    pub fn incident_edges(&self, vertex: VertexId) -> impl Iterator<Item = &EdgeRecord> + '_ {
        self.state
            .out_edge_ids(vertex)
            .chain(self.state.in_edge_ids(vertex))
            .filter_map(move |id| self.state.edge(id))
    }

    /// Vertices reached by following outgoing `label` edges.
    pub fn out_vertices<'a>(
        &'a self,
        vertex: VertexId,
        label: &'a str,
    ) -> impl Iterator<Item = VertexId> + 'a {
        self.out_edges(vertex, label).map(|e| e.in_vertex)
    }

    /// Vertices reached by following incoming `label` edges backwards.
    pub fn in_vertices<'a>(
        &'a self,
        vertex: VertexId,
        label: &'a str,
    ) -> impl Iterator<Item = VertexId> + 'a {
        self.in_edges(vertex, label).map(|e| e.out_vertex)
    }

    /// `label` edges from `out_vertex` to `in_vertex`, found by adjacency scan.
    pub fn edges_between(
        &self,
        out_vertex: VertexId,
        in_vertex: VertexId,
        label: &str,
    ) -> Vec<EdgeId> {
        self.out_edges(out_vertex, label)
            .filter(|e| e.in_vertex == in_vertex)
            .map(|e| e.id)
            .collect()
    }

    // ── Edge Indices ─────────────────────────────────────────────

    pub fn has_edge_index(&self, label: &str) -> bool {
        self.state.has_edge_index(label)
    }

    /// `label` edges from `out_vertex` to `in_vertex`, found through the
    /// label's edge index.
    pub fn edges_by_index(
        &self,
        label: &str,
        in_vertex: VertexId,
        out_vertex: VertexId,
    ) -> Result<Vec<EdgeId>, GraphError> {
        self.state
            .indexed_edges(label, &CompositeKey::new(in_vertex, out_vertex))
            .ok_or_else(|| GraphError::MissingIndex(label.to_string()))
    }

    pub fn vertex_count(&self) -> usize {
        self.state.vertex_count()
    }

    pub fn edge_count(&self) -> usize {
        self.state.edge_count()
    }
}
