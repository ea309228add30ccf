//! Projects: aggregates that provision their own sub-roots when created.
//!
//! A project owns a tag family root, a tag root, a schema root and a node
//! root, plus one base node inside its node root. Nodes of a project are
//! indexed in their own search index, `node-<project uuid>`.

use arbor_core::models::ProjectCreateRequest;
use arbor_core::{ElementId, ElementKind, ErrorMessage, Permission, SearchQueueBatch};
use arbor_graph::Transaction;

use crate::element::Element;
use crate::error::{Result, StoreError};
use crate::labels;
use crate::permissions::ActionContext;
use crate::root::{self, CollectionRoot, PathTarget, RootKind};
use crate::schema::SchemaContainer;

/// Sub-roots in deletion order, with the label linking them to the project.
const SUB_ROOTS: [(RootKind, &str); 4] = [
    (RootKind::Nodes, labels::HAS_NODE_ROOT),
    (RootKind::Tags, labels::HAS_TAG_ROOT),
    (RootKind::TagFamilies, labels::HAS_TAGFAMILY_ROOT),
    (RootKind::Schemas, labels::HAS_SCHEMA_ROOT),
];

fn sub_root_label(kind: RootKind) -> Option<&'static str> {
    SUB_ROOTS
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, label)| *label)
}

/// Name of the search index holding the nodes of a project.
pub fn node_index_name(project: ElementId) -> String {
    format!("node-{project}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Project {
    element: Element,
}

impl Project {
    pub fn from_element(element: Element) -> Option<Project> {
        (element.kind() == ElementKind::Project).then_some(Project { element })
    }

    pub fn element(&self) -> Element {
        self.element
    }

    pub fn id(&self) -> ElementId {
        self.element.id()
    }

    pub fn node_index_name(&self) -> String {
        node_index_name(self.id())
    }

    /// The project owning a sub-root; `None` for the global schema root.
    pub fn owning(tx: &Transaction, root: &CollectionRoot) -> Result<Option<Project>> {
        let Some(label) = sub_root_label(root.kind()) else {
            return Ok(None);
        };
        Ok(root
            .element()
            .in_one(tx, label)?
            .and_then(Project::from_element))
    }

    /// Assign `element` to the project owning `root`, if any.
    pub(crate) fn adopt(
        tx: &mut Transaction,
        root: &CollectionRoot,
        element: &Element,
    ) -> Result<Option<Project>> {
        let project = Project::owning(tx, root)?;
        if let Some(project) = project {
            element.set_single_link_out_to(tx, &project.element, &[labels::ASSIGNED_TO_PROJECT])?;
        }
        Ok(project)
    }

    /// The project an element was created in.
    pub fn of(tx: &Transaction, element: &Element) -> Result<Option<Project>> {
        Ok(element
            .out_one(tx, labels::ASSIGNED_TO_PROJECT)?
            .and_then(Project::from_element))
    }

    // ── Sub-roots ────────────────────────────────────────────────

    pub fn sub_root(&self, tx: &Transaction, kind: RootKind) -> Result<CollectionRoot> {
        let label = sub_root_label(kind).ok_or_else(|| {
            StoreError::BadRequest(ErrorMessage::new(
                "error_unknown_root_segment",
                [kind.path_segment()],
            ))
        })?;
        CollectionRoot::typed(self.element.out_one(tx, label)?, kind)
            .ok_or_else(|| StoreError::corrupted(self.id(), label))
    }

    pub fn tag_family_root(&self, tx: &Transaction) -> Result<CollectionRoot> {
        self.sub_root(tx, RootKind::TagFamilies)
    }

    pub fn tag_root(&self, tx: &Transaction) -> Result<CollectionRoot> {
        self.sub_root(tx, RootKind::Tags)
    }

    pub fn schema_root(&self, tx: &Transaction) -> Result<CollectionRoot> {
        self.sub_root(tx, RootKind::Schemas)
    }

    pub fn node_root(&self, tx: &Transaction) -> Result<CollectionRoot> {
        self.sub_root(tx, RootKind::Nodes)
    }

    pub fn base_node(&self, tx: &Transaction) -> Result<Element> {
        self.element
            .out_one(tx, labels::HAS_ROOT_NODE)?
            .ok_or_else(|| StoreError::corrupted(self.id(), labels::HAS_ROOT_NODE))
    }

    /// Resolve `tagFamilies`, `tags`, `schemas` or `nodes` and continue below.
    pub fn resolve_path(
        &self,
        tx: &Transaction,
        ac: &ActionContext<'_>,
        segments: &[&str],
    ) -> Result<PathTarget> {
        let Some((segment, rest)) = segments.split_first() else {
            return Ok(PathTarget::Element(self.element));
        };
        let kind = RootKind::from_segment(segment)
            .filter(|kind| sub_root_label(*kind).is_some())
            .ok_or_else(|| {
                StoreError::BadRequest(ErrorMessage::new("error_unknown_root_segment", [*segment]))
            })?;
        self.sub_root(tx, kind)?.resolve_path(tx, ac, rest)
    }

    // ── Schemas ──────────────────────────────────────────────────

    /// Make `container` available to nodes of this project.
    pub fn assign_schema(
        &self,
        tx: &mut Transaction,
        ac: &ActionContext<'_>,
        container: &SchemaContainer,
    ) -> Result<bool> {
        ac.require(tx, &self.element, Permission::Update)?;
        let added = self.schema_root(tx)?.add_member(tx, &container.element())?;
        if added {
            tracing::info!(project = %self.id(), schema = %container.id(), "Schema assigned");
        }
        Ok(added)
    }

    pub fn unassign_schema(
        &self,
        tx: &mut Transaction,
        ac: &ActionContext<'_>,
        container: &SchemaContainer,
    ) -> Result<bool> {
        ac.require(tx, &self.element, Permission::Update)?;
        self.schema_root(tx)?.remove_member(tx, &container.element())
    }

    // ── Creation ─────────────────────────────────────────────────

    /// Create the project element with its sub-roots and base node and stamp
    /// `creator`. Does not check names or permissions and does not register
    /// the project with any root.
    pub(crate) fn provision(
        tx: &mut Transaction,
        name: &str,
        creator: Option<&Element>,
        explicit_id: Option<ElementId>,
    ) -> Result<Project> {
        let element = Element::create(tx, ElementKind::Project, explicit_id)?;
        element.set_name(tx, name)?;
        let project = Project { element };

        for (kind, label) in SUB_ROOTS {
            let root = CollectionRoot::create_root(tx, kind)?;
            element.set_single_link_out_to(tx, &root.element(), &[label])?;
        }

        let base = Element::create(tx, ElementKind::Node, None)?;
        base.set_name(tx, name)?;
        base.set_single_link_out_to(tx, &element, &[labels::ASSIGNED_TO_PROJECT])?;
        base.stamp_created(tx, creator)?;
        element.set_single_link_out_to(tx, &base, &[labels::HAS_ROOT_NODE])?;
        project.node_root(tx)?.add_member(tx, &base)?;

        element.stamp_created(tx, creator)?;
        Ok(project)
    }

    /// The project, its sub-roots and its base node.
    fn owned_elements(&self, tx: &Transaction) -> Result<Vec<Element>> {
        let mut owned = vec![self.element];
        for (kind, _) in SUB_ROOTS {
            owned.push(self.sub_root(tx, kind)?.element());
        }
        owned.push(self.base_node(tx)?);
        Ok(owned)
    }
}

/// Create hook of the project root.
pub(crate) fn create(
    tx: &mut Transaction,
    ac: &ActionContext<'_>,
    root: &CollectionRoot,
    request: &ProjectCreateRequest,
    explicit_id: Option<ElementId>,
    batch: &mut SearchQueueBatch,
) -> Result<Element> {
    root::require_name(&request.name, "project_missing_name")?;
    ac.require(tx, &root.element(), Permission::Create)?;
    root.check_name_free(tx, &request.name, "project_conflicting_name")?;

    let creator = ac.user(tx);
    let project = Project::provision(tx, &request.name, creator.as_ref(), explicit_id)?;
    root.add_member(tx, &project.element)?;

    for element in project.owned_elements(tx)? {
        ac.grant_crud(tx, &element)?;
    }

    batch.create_document("project", project.id(), ElementKind::Project);
    batch.create_document(
        &project.node_index_name(),
        project.base_node(tx)?.id(),
        ElementKind::Node,
    );
    tracing::info!(project = %request.name, id = %project.id(), "Project created");
    Ok(project.element)
}

/// Delete a project with its sub-roots and everything they own, then drop
/// the project's node index.
pub(crate) fn delete(
    tx: &mut Transaction,
    element: Element,
    batch: &mut SearchQueueBatch,
) -> Result<()> {
    let project = Project { element };
    let name = element.name(tx)?.unwrap_or_default();
    for (kind, label) in SUB_ROOTS {
        if let Some(sub_root) = CollectionRoot::typed(element.out_one(tx, label)?, kind) {
            root::delete_sub_root(tx, sub_root, batch)?;
        }
    }
    batch.delete_document("project", project.id());
    batch.drop_index(&project.node_index_name());
    element.remove(tx)?;
    tracing::info!(project = %name, id = %project.id(), "Project deleted");
    Ok(())
}
