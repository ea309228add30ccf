//! Core domain types for the Arbor object store.
//!
//! Every persisted element carries a globally unique [`ElementId`] and belongs
//! to exactly one [`ElementKind`]. Permissions, principals and paging are
//! shared by every collection root.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ErrorMessage;

// ── Identity ──────────────────────────────────────────────────────

/// Globally unique identity of a persisted element.
///
/// Unique across the entire store, not just within one collection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ElementId(pub Uuid);

impl ElementId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ElementId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for ElementId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

// ── Element Kinds ─────────────────────────────────────────────────

/// Returned when a stored kind tag does not name a known element kind.
#[derive(Debug, thiserror::Error)]
#[error("Unknown element kind: {0}")]
pub struct UnknownKind(pub String);

/// The closed set of persisted element kinds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// The root-of-roots singleton.
    StoreRoot,
    ProjectRoot,
    UserRoot,
    SchemaRoot,
    TagFamilyRoot,
    TagRoot,
    NodeRoot,
    Project,
    User,
    SchemaContainer,
    SchemaVersion,
    TagFamily,
    Tag,
    Node,
}

impl ElementKind {
    pub const ALL: [ElementKind; 14] = [
        ElementKind::StoreRoot,
        ElementKind::ProjectRoot,
        ElementKind::UserRoot,
        ElementKind::SchemaRoot,
        ElementKind::TagFamilyRoot,
        ElementKind::TagRoot,
        ElementKind::NodeRoot,
        ElementKind::Project,
        ElementKind::User,
        ElementKind::SchemaContainer,
        ElementKind::SchemaVersion,
        ElementKind::TagFamily,
        ElementKind::Tag,
        ElementKind::Node,
    ];

    /// The vertex type tag stored in the graph.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StoreRoot => "StoreRoot",
            Self::ProjectRoot => "ProjectRoot",
            Self::UserRoot => "UserRoot",
            Self::SchemaRoot => "SchemaRoot",
            Self::TagFamilyRoot => "TagFamilyRoot",
            Self::TagRoot => "TagRoot",
            Self::NodeRoot => "NodeRoot",
            Self::Project => "Project",
            Self::User => "User",
            Self::SchemaContainer => "SchemaContainer",
            Self::SchemaVersion => "SchemaVersion",
            Self::TagFamily => "TagFamily",
            Self::Tag => "Tag",
            Self::Node => "Node",
        }
    }

    /// Whether elements of this kind aggregate other elements.
    pub fn is_root(&self) -> bool {
        matches!(
            self,
            Self::StoreRoot
                | Self::ProjectRoot
                | Self::UserRoot
                | Self::SchemaRoot
                | Self::TagFamilyRoot
                | Self::TagRoot
                | Self::NodeRoot
        )
    }

    /// Name of the search index holding documents of this kind.
    ///
    /// Nodes are indexed per project and roots or versions are not indexed,
    /// so those return `None`.
    pub fn index_name(&self) -> Option<&'static str> {
        match self {
            Self::Project => Some("project"),
            Self::User => Some("user"),
            Self::SchemaContainer => Some("schema"),
            Self::TagFamily => Some("tag-family"),
            Self::Tag => Some("tag"),
            _ => None,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|kind| kind.as_str() == s)
            .copied()
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

// ── Permissions ───────────────────────────────────────────────────

/// An action a principal may be granted on an element.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Create,
    Read,
    Update,
    Delete,
}

impl Permission {
    pub const ALL: [Permission; 4] = [
        Permission::Create,
        Permission::Read,
        Permission::Update,
        Permission::Delete,
    ];

    /// Label of the grant edge from a user element to the granted element.
    pub fn edge_label(&self) -> &'static str {
        match self {
            Self::Create => "HAS_CREATE_PERMISSION",
            Self::Read => "HAS_READ_PERMISSION",
            Self::Update => "HAS_UPDATE_PERMISSION",
            Self::Delete => "HAS_DELETE_PERMISSION",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(s)
    }
}

// ── Principal ─────────────────────────────────────────────────────

/// The acting identity permissions are evaluated against.
///
/// Authentication happens outside the store; callers hand in an already
/// resolved principal whose `id` is the identity of a user element.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub id: ElementId,
    pub name: String,
    /// Administrators pass every permission check.
    pub admin: bool,
}

impl Principal {
    pub fn new(id: ElementId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            admin: false,
        }
    }

    pub fn admin(id: ElementId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            admin: true,
        }
    }
}

// ── Paging ────────────────────────────────────────────────────────

/// Requested page of a listing. Pages are 1-based.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PagingParameters {
    pub page: u32,
    pub per_page: u32,
}

impl PagingParameters {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self { page, per_page }
    }

    /// Reject pages below 1 and page sizes outside `1..=max_per_page`.
    pub fn validate(&self, max_per_page: u32) -> Result<(), ErrorMessage> {
        if self.page < 1 {
            return Err(ErrorMessage::new(
                "error_page_parameter_must_be_positive",
                [self.page.to_string()],
            ));
        }
        if self.per_page < 1 || self.per_page > max_per_page {
            return Err(ErrorMessage::new(
                "error_pagesize_parameter",
                [self.per_page.to_string(), max_per_page.to_string()],
            ));
        }
        Ok(())
    }

    /// Number of visible items preceding the requested page.
    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize).saturating_mul(self.per_page as usize)
    }
}

impl Default for PagingParameters {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 25,
        }
    }
}

/// One page of a listing plus the totals needed to navigate the rest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub current_page: u32,
    pub per_page: u32,
    pub page_count: u32,
    pub total_count: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, paging: &PagingParameters, total_count: u64) -> Self {
        let per_page = u64::from(paging.per_page.max(1));
        let page_count = total_count.div_ceil(per_page) as u32;
        Self {
            items,
            current_page: paging.page,
            per_page: paging.per_page,
            page_count,
            total_count,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            current_page: self.current_page,
            per_page: self.per_page,
            page_count: self.page_count,
            total_count: self.total_count,
        }
    }
}
