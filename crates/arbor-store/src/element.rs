//! The base unit of persisted state and its linking primitives.
//!
//! An [`Element`] is a handle: the engine vertex, the global identity and the
//! kind. It owns no state; every accessor reads through the transaction it
//! is given, so handles may be copied freely and never form reference cycles.

use std::collections::BTreeMap;

use arbor_core::{ElementId, ElementKind, ErrorMessage, SearchQueueBatch};
use arbor_graph::{GraphError, Transaction, VertexId};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::labels;

pub const NAME: &str = "name";
pub const CREATED: &str = "created";
pub const EDITED: &str = "edited";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Element {
    vertex: VertexId,
    id: ElementId,
    kind: ElementKind,
}

/// Serialisable snapshot of an element, as returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementView {
    pub id: ElementId,
    pub kind: ElementKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<ElementId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor: Option<ElementId>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,
}

impl Element {
    // ── Construction ─────────────────────────────────────────────

    /// Create a new element of `kind`. Uses `explicit_id` when given,
    /// otherwise a fresh identity.
    pub fn create(
        tx: &mut Transaction,
        kind: ElementKind,
        explicit_id: Option<ElementId>,
    ) -> Result<Element> {
        let id = explicit_id.unwrap_or_default();
        let vertex = tx.add_vertex(kind.as_str(), id.0).map_err(|e| match e {
            GraphError::DuplicateUuid(_) => StoreError::conflict(
                ErrorMessage::new("error_uuid_taken", [id.to_string()]),
                Some(id),
            ),
            other => StoreError::Graph(other),
        })?;
        Ok(Element { vertex, id, kind })
    }

    pub fn from_vertex(tx: &Transaction, vertex: VertexId) -> Result<Element> {
        let record = tx.vertex(vertex)?;
        Ok(Element {
            vertex,
            id: ElementId(record.uuid),
            kind: record.kind.parse()?,
        })
    }

    /// Look an identity up in the global identity index, whatever its kind.
    pub fn find(tx: &Transaction, id: ElementId) -> Result<Option<Element>> {
        tx.find_vertex(None, &id.0)
            .map(|v| Element::from_vertex(tx, v.id))
            .transpose()
    }

    /// Look an identity up in the global identity index, restricted to `kind`.
    pub fn find_of_kind(
        tx: &Transaction,
        kind: ElementKind,
        id: ElementId,
    ) -> Option<Element> {
        tx.find_vertex(Some(kind.as_str()), &id.0).map(|v| Element {
            vertex: v.id,
            id,
            kind,
        })
    }

    pub fn vertex(&self) -> VertexId {
        self.vertex
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    // ── Properties ───────────────────────────────────────────────

    pub fn property(&self, tx: &Transaction, key: &str) -> Result<Option<Value>> {
        Ok(tx.property(self.vertex, key)?.cloned())
    }

    pub fn property_str(&self, tx: &Transaction, key: &str) -> Result<Option<String>> {
        Ok(tx
            .property(self.vertex, key)?
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    pub fn set_property(
        &self,
        tx: &mut Transaction,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<()> {
        Ok(tx.set_property(self.vertex, key, value)?)
    }

    pub fn remove_property(&self, tx: &mut Transaction, key: &str) -> Result<()> {
        Ok(tx.remove_property(self.vertex, key)?)
    }

    pub fn name(&self, tx: &Transaction) -> Result<Option<String>> {
        self.property_str(tx, NAME)
    }

    pub fn set_name(&self, tx: &mut Transaction, name: &str) -> Result<()> {
        self.set_property(tx, NAME, name)
    }

    // ── Linking ──────────────────────────────────────────────────

    /// Add an edge `self -[label]-> target`. Not deduplicated.
    pub fn link_out(&self, tx: &mut Transaction, target: &Element, label: &str) -> Result<()> {
        tx.add_edge(label, self.vertex, target.vertex)?;
        Ok(())
    }

    /// Add an edge `source -[label]-> self`. Not deduplicated.
    pub fn link_in(&self, tx: &mut Transaction, source: &Element, label: &str) -> Result<()> {
        tx.add_edge(label, source.vertex, self.vertex)?;
        Ok(())
    }

    /// Remove outgoing edges with any of `labels`; to `target` only, or to
    /// every endpoint when `target` is `None`. Returns the number removed.
    pub fn unlink_out(
        &self,
        tx: &mut Transaction,
        target: Option<&Element>,
        labels: &[&str],
    ) -> Result<usize> {
        let mut doomed = Vec::new();
        for label in labels {
            doomed.extend(
                tx.out_edges(self.vertex, label)
                    .filter(|e| target.map_or(true, |t| e.in_vertex == t.vertex))
                    .map(|e| e.id),
            );
        }
        for edge in &doomed {
            tx.remove_edge(*edge)?;
        }
        Ok(doomed.len())
    }

    /// Remove incoming edges with any of `labels`; from `source` only, or
    /// from every endpoint when `source` is `None`. Returns the number removed.
    pub fn unlink_in(
        &self,
        tx: &mut Transaction,
        source: Option<&Element>,
        labels: &[&str],
    ) -> Result<usize> {
        let mut doomed = Vec::new();
        for label in labels {
            doomed.extend(
                tx.in_edges(self.vertex, label)
                    .filter(|e| source.map_or(true, |s| e.out_vertex == s.vertex))
                    .map(|e| e.id),
            );
        }
        for edge in &doomed {
            tx.remove_edge(*edge)?;
        }
        Ok(doomed.len())
    }

    /// Replace every outgoing edge with the given labels by one edge to
    /// `target`. Afterwards this element has at most one out-edge per label.
    pub fn set_single_link_out_to(
        &self,
        tx: &mut Transaction,
        target: &Element,
        labels: &[&str],
    ) -> Result<()> {
        self.unlink_out(tx, None, labels)?;
        for label in labels {
            self.link_out(tx, target, label)?;
        }
        Ok(())
    }

    /// Replace the edges between this element and `target` with the given
    /// labels by one edge each. Edges to other targets are kept.
    pub fn set_unique_link_out_to(
        &self,
        tx: &mut Transaction,
        target: &Element,
        labels: &[&str],
    ) -> Result<()> {
        self.unlink_out(tx, Some(target), labels)?;
        for label in labels {
            self.link_out(tx, target, label)?;
        }
        Ok(())
    }

    /// Incoming mirror of [`Element::set_single_link_out_to`].
    pub fn set_single_link_in_to(
        &self,
        tx: &mut Transaction,
        source: &Element,
        labels: &[&str],
    ) -> Result<()> {
        self.unlink_in(tx, None, labels)?;
        for label in labels {
            self.link_in(tx, source, label)?;
        }
        Ok(())
    }

    /// Incoming mirror of [`Element::set_unique_link_out_to`].
    pub fn set_unique_link_in_to(
        &self,
        tx: &mut Transaction,
        source: &Element,
        labels: &[&str],
    ) -> Result<()> {
        self.unlink_in(tx, Some(source), labels)?;
        for label in labels {
            self.link_in(tx, source, label)?;
        }
        Ok(())
    }

    // ── Navigation ───────────────────────────────────────────────

    pub fn out_elements(&self, tx: &Transaction, label: &str) -> Result<Vec<Element>> {
        tx.out_vertices(self.vertex, label)
            .map(|v| Element::from_vertex(tx, v))
            .collect()
    }

    pub fn in_elements(&self, tx: &Transaction, label: &str) -> Result<Vec<Element>> {
        tx.in_vertices(self.vertex, label)
            .map(|v| Element::from_vertex(tx, v))
            .collect()
    }

    /// Target of the first outgoing `label` edge.
    pub fn out_one(&self, tx: &Transaction, label: &str) -> Result<Option<Element>> {
        tx.out_vertices(self.vertex, label)
            .next()
            .map(|v| Element::from_vertex(tx, v))
            .transpose()
    }

    /// Source of the first incoming `label` edge.
    pub fn in_one(&self, tx: &Transaction, label: &str) -> Result<Option<Element>> {
        tx.in_vertices(self.vertex, label)
            .next()
            .map(|v| Element::from_vertex(tx, v))
            .transpose()
    }

    // ── Audit ────────────────────────────────────────────────────

    pub fn set_creator(&self, tx: &mut Transaction, user: &Element) -> Result<()> {
        self.set_single_link_out_to(tx, user, &[labels::HAS_CREATOR])?;
        self.set_property(tx, CREATED, Utc::now().timestamp_millis())
    }

    pub fn set_editor(&self, tx: &mut Transaction, user: &Element) -> Result<()> {
        self.set_single_link_out_to(tx, user, &[labels::HAS_EDITOR])?;
        self.set_property(tx, EDITED, Utc::now().timestamp_millis())
    }

    /// Stamp creator and editor with the same user and timestamp. Without a
    /// user only the timestamps are written.
    pub fn stamp_created(&self, tx: &mut Transaction, user: Option<&Element>) -> Result<()> {
        let now = Utc::now().timestamp_millis();
        if let Some(user) = user {
            self.set_single_link_out_to(tx, user, &[labels::HAS_CREATOR])?;
            self.set_single_link_out_to(tx, user, &[labels::HAS_EDITOR])?;
        }
        self.set_property(tx, CREATED, now)?;
        self.set_property(tx, EDITED, now)
    }

    pub fn creator(&self, tx: &Transaction) -> Result<Option<Element>> {
        self.out_one(tx, labels::HAS_CREATOR)
    }

    pub fn editor(&self, tx: &Transaction) -> Result<Option<Element>> {
        self.out_one(tx, labels::HAS_EDITOR)
    }

    pub fn view(&self, tx: &Transaction) -> Result<ElementView> {
        let record = tx.vertex(self.vertex)?;
        let mut properties = record.properties.clone();
        let name = properties
            .remove(NAME)
            .and_then(|v| v.as_str().map(str::to_string));
        let created = properties.remove(CREATED).and_then(|v| v.as_i64());
        let edited = properties.remove(EDITED).and_then(|v| v.as_i64());
        Ok(ElementView {
            id: self.id,
            kind: self.kind,
            name,
            created,
            edited,
            creator: self.creator(tx)?.map(|u| u.id),
            editor: self.editor(tx)?.map(|u| u.id),
            properties,
        })
    }

    // ── Deletion ─────────────────────────────────────────────────

    /// Delete this element and whatever it owns, recording the index
    /// changes in `batch`. Kinds that must not be deleted are rejected.
    pub fn delete(self, tx: &mut Transaction, batch: &mut SearchQueueBatch) -> Result<()> {
        match self.kind {
            ElementKind::StoreRoot | ElementKind::ProjectRoot | ElementKind::UserRoot => {
                Err(StoreError::unsupported_delete(self.kind))
            }
            ElementKind::SchemaVersion => Err(StoreError::Unsupported(ErrorMessage::key(
                "schema_error_version_immutable",
            ))),
            ElementKind::SchemaRoot
            | ElementKind::TagFamilyRoot
            | ElementKind::TagRoot
            | ElementKind::NodeRoot => Err(StoreError::Unsupported(ErrorMessage::new(
                "error_delete_with_owner",
                [self.kind.to_string()],
            ))),
            ElementKind::Project => crate::project::delete(tx, self, batch),
            ElementKind::User => crate::user::delete(tx, self, batch),
            ElementKind::SchemaContainer => crate::schema::delete(tx, self, batch),
            ElementKind::TagFamily => crate::tag::delete_tag_family(tx, self, batch),
            ElementKind::Tag => crate::tag::delete_tag(tx, self, batch),
            ElementKind::Node => crate::node::delete(tx, self, batch),
        }
    }

    /// Remove the vertex and all incident edges without any cascade.
    pub(crate) fn remove(self, tx: &mut Transaction) -> Result<()> {
        tx.remove_vertex(self.vertex)?;
        Ok(())
    }
}
