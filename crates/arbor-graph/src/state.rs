//! Graph state: vertices, edges, adjacency and secondary indices.
//!
//! A `GraphState` is both the committed state held by the [`Database`] and
//! the private working copy of every open transaction. All writes go through
//! [`GraphState::apply`] so the identity, kind and edge indices always match
//! the vertex and edge maps.
//!
//! Every map is a persistent `im` structure: cloning a state shares its
//! structure, and a transaction only copies the paths it writes to.
//!
//! [`Database`]: crate::Database

use std::collections::BTreeMap;
use std::fmt;

use im::{HashMap, OrdSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::client::GraphError;

/// Engine-internal vertex handle. Never reused within one database.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct VertexId(pub u64);

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#v{}", self.0)
    }
}

/// Engine-internal edge handle. Allocated in increasing order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct EdgeId(pub u64);

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#e{}", self.0)
    }
}

/// A stored vertex: type tag, global identity and property bag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VertexRecord {
    pub id: VertexId,
    pub kind: String,
    pub uuid: Uuid,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

/// A stored directed, labeled edge from `out_vertex` to `in_vertex`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EdgeRecord {
    pub id: EdgeId,
    pub label: String,
    pub out_vertex: VertexId,
    pub in_vertex: VertexId,
}

/// Key of an edge index entry, derived from the (in, out) vertex pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompositeKey {
    pub in_vertex: VertexId,
    pub out_vertex: VertexId,
}

impl CompositeKey {
    pub fn new(in_vertex: VertexId, out_vertex: VertexId) -> Self {
        Self {
            in_vertex,
            out_vertex,
        }
    }
}

/// One logged write. Transactions record these so a commit can be replayed
/// against a newer committed state.
#[derive(Debug, Clone)]
pub(crate) enum Mutation {
    AddVertex {
        id: VertexId,
        kind: String,
        uuid: Uuid,
    },
    SetProperty {
        vertex: VertexId,
        key: String,
        value: Value,
    },
    RemoveProperty {
        vertex: VertexId,
        key: String,
    },
    RemoveVertex {
        vertex: VertexId,
    },
    AddEdge {
        id: EdgeId,
        label: String,
        out_vertex: VertexId,
        in_vertex: VertexId,
    },
    RemoveEdge {
        edge: EdgeId,
    },
}

/// On-disk form of the graph. Indices are rebuilt on load.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Snapshot {
    pub vertices: Vec<VertexRecord>,
    pub edges: Vec<EdgeRecord>,
    pub edge_indices: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct GraphState {
    vertices: HashMap<VertexId, VertexRecord>,
    edges: HashMap<EdgeId, EdgeRecord>,
    out_adjacency: HashMap<VertexId, OrdSet<EdgeId>>,
    in_adjacency: HashMap<VertexId, OrdSet<EdgeId>>,
    uuid_index: HashMap<Uuid, VertexId>,
    kind_index: HashMap<String, OrdSet<VertexId>>,
    edge_indices: HashMap<String, HashMap<CompositeKey, OrdSet<EdgeId>>>,
}

impl GraphState {
    // ── Writes ───────────────────────────────────────────────────

    pub(crate) fn apply(&mut self, mutation: &Mutation) -> Result<(), GraphError> {
        match mutation {
            Mutation::AddVertex { id, kind, uuid } => {
                if self.uuid_index.contains_key(uuid) {
                    return Err(GraphError::DuplicateUuid(*uuid));
                }
                self.uuid_index.insert(*uuid, *id);
                self.kind_index
                    .entry(kind.clone())
                    .or_insert_with(OrdSet::new)
                    .insert(*id);
                self.vertices.insert(
                    *id,
                    VertexRecord {
                        id: *id,
                        kind: kind.clone(),
                        uuid: *uuid,
                        properties: BTreeMap::new(),
                    },
                );
            }
            Mutation::SetProperty { vertex, key, value } => {
                let record = self
                    .vertices
                    .get_mut(vertex)
                    .ok_or(GraphError::VertexNotFound(*vertex))?;
                record.properties.insert(key.clone(), value.clone());
            }
            Mutation::RemoveProperty { vertex, key } => {
                let record = self
                    .vertices
                    .get_mut(vertex)
                    .ok_or(GraphError::VertexNotFound(*vertex))?;
                record.properties.remove(key);
            }
            Mutation::RemoveVertex { vertex } => {
                let record = self
                    .vertices
                    .remove(vertex)
                    .ok_or(GraphError::VertexNotFound(*vertex))?;
                self.uuid_index.remove(&record.uuid);
                if let Some(ids) = self.kind_index.get_mut(&record.kind) {
                    ids.remove(vertex);
                }

                let incident: Vec<EdgeId> = self
                    .out_adjacency
                    .remove(vertex)
                    .into_iter()
                    .flatten()
                    .chain(self.in_adjacency.remove(vertex).into_iter().flatten())
                    .collect();
                for edge in incident {
                    // Self-loops appear in both adjacency sets.
                    if self.edges.contains_key(&edge) {
                        self.detach_edge(edge);
                    }
                }
            }
            Mutation::AddEdge {
                id,
                label,
                out_vertex,
                in_vertex,
            } => {
                for v in [out_vertex, in_vertex] {
                    if !self.vertices.contains_key(v) {
                        return Err(GraphError::VertexNotFound(*v));
                    }
                }
                let record = EdgeRecord {
                    id: *id,
                    label: label.clone(),
                    out_vertex: *out_vertex,
                    in_vertex: *in_vertex,
                };
                self.out_adjacency
                    .entry(*out_vertex)
                    .or_insert_with(OrdSet::new)
                    .insert(*id);
                self.in_adjacency
                    .entry(*in_vertex)
                    .or_insert_with(OrdSet::new)
                    .insert(*id);
                if let Some(index) = self.edge_indices.get_mut(label) {
                    index
                        .entry(CompositeKey::new(*in_vertex, *out_vertex))
                        .or_insert_with(OrdSet::new)
                        .insert(*id);
                }
                self.edges.insert(*id, record);
            }
            Mutation::RemoveEdge { edge } => {
                if !self.edges.contains_key(edge) {
                    return Err(GraphError::EdgeNotFound(*edge));
                }
                self.detach_edge(*edge);
            }
        }
        Ok(())
    }

    /// Remove an existing edge from the edge map, both adjacency sets and its index.
    fn detach_edge(&mut self, edge: EdgeId) {
        let Some(record) = self.edges.remove(&edge) else {
            return;
        };
        if let Some(set) = self.out_adjacency.get_mut(&record.out_vertex) {
            set.remove(&edge);
        }
        if let Some(set) = self.in_adjacency.get_mut(&record.in_vertex) {
            set.remove(&edge);
        }
        if let Some(index) = self.edge_indices.get_mut(&record.label) {
            let key = CompositeKey::new(record.in_vertex, record.out_vertex);
            if let Some(entries) = index.get_mut(&key) {
                entries.remove(&edge);
                if entries.is_empty() {
                    index.remove(&key);
                }
            }
        }
    }

    /// Register an edge index for `label`, indexing the edges that already exist.
    pub(crate) fn create_edge_index(&mut self, label: &str) {
        if self.edge_indices.contains_key(label) {
            return;
        }
        let mut index: HashMap<CompositeKey, OrdSet<EdgeId>> = HashMap::new();
        for edge in self.edges.values().filter(|e| e.label == label) {
            index
                .entry(CompositeKey::new(edge.in_vertex, edge.out_vertex))
                .or_insert_with(OrdSet::new)
                .insert(edge.id);
        }
        self.edge_indices.insert(label.to_string(), index);
    }

    // ── Reads ────────────────────────────────────────────────────

    pub fn vertex(&self, id: VertexId) -> Option<&VertexRecord> {
        self.vertices.get(&id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&EdgeRecord> {
        self.edges.get(&id)
    }

    pub fn vertex_by_uuid(&self, uuid: &Uuid) -> Option<&VertexRecord> {
        self.uuid_index.get(uuid).and_then(|id| self.vertices.get(id))
    }

    pub fn vertices(&self) -> impl Iterator<Item = &VertexRecord> {
        self.vertices.values()
    }

    /// Ids of the vertices of `kind`, in ascending order.
    pub fn vertex_ids_of_kind<'a>(&'a self, kind: &str) -> impl Iterator<Item = VertexId> + 'a {
        self.kind_index
            .get(kind)
            .into_iter()
            .flat_map(|ids| ids.iter().copied())
    }

    pub fn out_edge_ids(&self, vertex: VertexId) -> impl Iterator<Item = EdgeId> + '_ {
        self.out_adjacency
            .get(&vertex)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    pub fn in_edge_ids(&self, vertex: VertexId) -> impl Iterator<Item = EdgeId> + '_ {
        self.in_adjacency
            .get(&vertex)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    pub fn has_edge_index(&self, label: &str) -> bool {
        self.edge_indices.contains_key(label)
    }

    /// Edge ids stored under `key` in the index for `label`; `None` if the
    /// label is not indexed.
    pub fn indexed_edges(&self, label: &str, key: &CompositeKey) -> Option<Vec<EdgeId>> {
        let index = self.edge_indices.get(label)?;
        Some(
            index
                .get(key)
                .map(|set| set.iter().copied().collect())
                .unwrap_or_default(),
        )
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Highest vertex and edge ids in use, for id allocation after a load.
    pub(crate) fn max_ids(&self) -> (u64, u64) {
        let v = self.vertices.keys().map(|id| id.0).max().unwrap_or(0);
        let e = self.edges.keys().map(|id| id.0).max().unwrap_or(0);
        (v, e)
    }

    // ── Snapshots ────────────────────────────────────────────────

    pub(crate) fn to_snapshot(&self) -> Snapshot {
        let mut vertices: Vec<VertexRecord> = self.vertices.values().cloned().collect();
        vertices.sort_by_key(|v| v.id);
        let mut edges: Vec<EdgeRecord> = self.edges.values().cloned().collect();
        edges.sort_by_key(|e| e.id);
        let mut edge_indices: Vec<String> = self.edge_indices.keys().cloned().collect();
        edge_indices.sort();
        Snapshot {
            vertices,
            edges,
            edge_indices,
        }
    }

    pub(crate) fn from_snapshot(snapshot: Snapshot) -> Result<Self, GraphError> {
        let mut state = GraphState::default();
        for label in &snapshot.edge_indices {
            state.create_edge_index(label);
        }
        for vertex in snapshot.vertices {
            let id = vertex.id;
            state.apply(&Mutation::AddVertex {
                id,
                kind: vertex.kind,
                uuid: vertex.uuid,
            })?;
            if let Some(record) = state.vertices.get_mut(&id) {
                record.properties = vertex.properties;
            }
        }
        for edge in snapshot.edges {
            state.apply(&Mutation::AddEdge {
                id: edge.id,
                label: edge.label,
                out_vertex: edge.out_vertex,
                in_vertex: edge.in_vertex,
            })?;
        }
        Ok(state)
    }
}
