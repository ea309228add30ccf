//! Membership index: "is element X a member of root R?" without scanning R.
//!
//! Every membership label gets an edge index keyed by the (member, root)
//! vertex pair. The edges stay authoritative; the engine updates the index on
//! every edge insert and removal so the two cannot diverge.

use arbor_core::Permission;
use arbor_graph::{Database, EdgeId, Transaction};

use crate::element::Element;
use crate::error::Result;
use crate::labels;

/// Descriptive name of the index kept for `label`.
pub fn index_name(label: &str) -> String {
    format!("e.{}_inout", label.to_lowercase())
}

/// Register the membership and permission edge indices. Idempotent.
pub fn register_indices(db: &Database) {
    let permission_labels = Permission::ALL.map(|p| p.edge_label());
    for label in labels::MEMBERSHIP.iter().chain(permission_labels.iter()) {
        if !db.has_edge_index(label) {
            db.create_edge_index(label);
            tracing::debug!(index = %index_name(label), "Registered edge index");
        }
    }
}

/// Membership edges `root -[label]-> member`, found through the index.
pub fn edges(
    tx: &Transaction,
    root: &Element,
    member: &Element,
    label: &str,
) -> Result<Vec<EdgeId>> {
    Ok(tx.edges_by_index(label, member.vertex(), root.vertex())?)
}

pub fn is_member(tx: &Transaction, root: &Element, member: &Element, label: &str) -> Result<bool> {
    Ok(!edges(tx, root, member, label)?.is_empty())
}
