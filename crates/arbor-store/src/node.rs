//! Content nodes of a project.
//!
//! Every node is bound to one schema version and hangs below a parent node;
//! nodes created without a parent go below the project's base node.

use arbor_core::models::{NodeCreateRequest, SchemaDefinition};
use arbor_core::{ElementId, ElementKind, ErrorMessage, Permission, SearchQueueBatch};
use arbor_graph::Transaction;
use serde_json::{Map, Value};

use crate::element::Element;
use crate::error::{Result, StoreError};
use crate::labels;
use crate::permissions::ActionContext;
use crate::project::{node_index_name, Project};
use crate::root::CollectionRoot;
use crate::schema::{SchemaContainer, SchemaVersion};

/// Property holding the field values of a node.
pub const FIELDS: &str = "fields";

/// Create hook of a project's node root.
pub(crate) fn create(
    tx: &mut Transaction,
    ac: &ActionContext<'_>,
    root: &CollectionRoot,
    request: &NodeCreateRequest,
    explicit_id: Option<ElementId>,
    batch: &mut SearchQueueBatch,
) -> Result<Element> {
    ac.require(tx, &root.element(), Permission::Create)?;
    if request.schema.name.is_none() && request.schema.uuid.is_none() {
        return Err(StoreError::BadRequest(ErrorMessage::key("node_missing_schema")));
    }
    let project = Project::owning(tx, root)?
        .ok_or_else(|| StoreError::corrupted(root.id(), labels::HAS_NODE_ROOT))?;

    let version = SchemaContainer::resolve_reference(tx, &project.schema_root(tx)?, &request.schema)?;
    let definition = version.definition(tx)?;
    let parent = match request.parent {
        Some(id) => root
            .find_by_uuid(tx, id)?
            .ok_or_else(|| StoreError::not_found(id))?,
        None => project.base_node(tx)?,
    };
    if !allows_children(tx, &parent)? {
        return Err(StoreError::BadRequest(ErrorMessage::new(
            "node_parent_not_container",
            [parent.id().to_string()],
        )));
    }
    validate_fields(&definition, &request.fields)?;

    let node = Element::create(tx, ElementKind::Node, explicit_id)?;
    node.set_property(tx, FIELDS, Value::Object(request.fields.clone()))?;
    if let Some(name) = display_name(&definition, &request.fields) {
        node.set_name(tx, &name)?;
    }
    let container = version.container(tx)?;
    node.set_single_link_out_to(tx, &container.element(), &[labels::HAS_SCHEMA_CONTAINER])?;
    node.set_single_link_out_to(tx, &version.element(), &[labels::HAS_SCHEMA_CONTAINER_VERSION])?;
    node.set_single_link_out_to(tx, &parent, &[labels::HAS_PARENT_NODE])?;
    node.set_single_link_out_to(tx, &project.element(), &[labels::ASSIGNED_TO_PROJECT])?;
    let creator = ac.user(tx);
    node.stamp_created(tx, creator.as_ref())?;
    root.add_member(tx, &node)?;
    ac.grant_crud(tx, &node)?;

    batch.create_document(&project.node_index_name(), node.id(), ElementKind::Node);
    tracing::info!(
        node = %node.id(),
        schema = %definition.name,
        parent = %parent.id(),
        "Node created"
    );
    Ok(node)
}

/// Reject unknown fields, then missing required ones.
fn validate_fields(definition: &SchemaDefinition, fields: &Map<String, Value>) -> Result<()> {
    if let Some(unknown) = fields.keys().find(|name| definition.field(name).is_none()) {
        return Err(StoreError::BadRequest(ErrorMessage::new(
            "node_unknown_field",
            [unknown.as_str(), definition.name.as_str()],
        )));
    }
    let missing = definition
        .fields
        .iter()
        .find(|field| field.required && fields.get(&field.name).map_or(true, Value::is_null));
    match missing {
        Some(field) => Err(StoreError::BadRequest(ErrorMessage::new(
            "node_missing_required_field",
            [field.name.as_str()],
        ))),
        None => Ok(()),
    }
}

fn display_name(definition: &SchemaDefinition, fields: &Map<String, Value>) -> Option<String> {
    let value = fields.get(definition.display_field.as_deref()?)?;
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Base nodes have no schema and always accept children.
fn allows_children(tx: &Transaction, parent: &Element) -> Result<bool> {
    match schema_version(tx, parent)? {
        Some(version) => Ok(version.definition(tx)?.container),
        None => Ok(true),
    }
}

// ── Navigation ───────────────────────────────────────────────────

pub fn schema_version(tx: &Transaction, node: &Element) -> Result<Option<SchemaVersion>> {
    Ok(node
        .out_one(tx, labels::HAS_SCHEMA_CONTAINER_VERSION)?
        .and_then(SchemaVersion::from_element))
}

pub fn parent(tx: &Transaction, node: &Element) -> Result<Option<Element>> {
    node.out_one(tx, labels::HAS_PARENT_NODE)
}

pub fn children(tx: &Transaction, node: &Element) -> Result<Vec<Element>> {
    node.in_elements(tx, labels::HAS_PARENT_NODE)
}

pub fn fields(tx: &Transaction, node: &Element) -> Result<Map<String, Value>> {
    match node.property(tx, FIELDS)? {
        Some(Value::Object(fields)) => Ok(fields),
        _ => Ok(Map::new()),
    }
}

// ── Deletion ─────────────────────────────────────────────────────

pub(crate) fn delete(
    tx: &mut Transaction,
    node: Element,
    batch: &mut SearchQueueBatch,
) -> Result<()> {
    if node.in_one(tx, labels::HAS_ROOT_NODE)?.is_some() {
        return Err(StoreError::Unsupported(ErrorMessage::key(
            "node_error_delete_base_node",
        )));
    }
    delete_subtree(tx, node, batch)
}

/// Delete a node and all nodes below it, children first.
pub(crate) fn delete_subtree(
    tx: &mut Transaction,
    node: Element,
    batch: &mut SearchQueueBatch,
) -> Result<()> {
    let index = Project::of(tx, &node)?.map(|project| node_index_name(project.id()));

    let mut order = Vec::new();
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        stack.extend(children(tx, &current)?);
        order.push(current);
    }
    for current in order.into_iter().rev() {
        if !tx.contains_vertex(current.vertex()) {
            continue;
        }
        if let Some(index) = &index {
            batch.delete_document(index, current.id());
        }
        current.remove(tx)?;
    }
    tracing::debug!(node = %node.id(), "Node subtree deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::models::{ProjectCreateRequest, SchemaReference};
    use arbor_core::{CreateRequest, ErrorKind, FieldSchema, FieldType, Principal};
    use arbor_graph::{Database, GraphConfig};

    use crate::membership;
    use crate::permissions::GraphPermissions;
    use crate::root::RootKind;

    struct Fixture {
        db: Database,
        admin: Principal,
        project: Project,
    }

    fn folder() -> SchemaDefinition {
        let mut definition = SchemaDefinition::new("folder")
            .with_display_field("name")
            .with_field(FieldSchema::new("name", FieldType::String).required());
        definition.container = true;
        definition
    }

    fn content() -> SchemaDefinition {
        SchemaDefinition::new("content")
            .with_display_field("title")
            .with_field(FieldSchema::new("title", FieldType::String).required())
            .with_field(FieldSchema::new("teaser", FieldType::String))
    }

    fn fixture() -> Fixture {
        let db = Database::new(GraphConfig::default());
        membership::register_indices(&db);
        let (admin, project) = db
            .tx(|tx| {
                let user = Element::create(tx, ElementKind::User, None)?;
                let admin = Principal::admin(user.id(), "admin");
                let ac = ActionContext::new(&admin, &GraphPermissions);
                let mut batch = SearchQueueBatch::new();

                let projects = CollectionRoot::create_root(tx, RootKind::Projects)?;
                let request = CreateRequest::Project(ProjectCreateRequest {
                    name: "alpha".to_string(),
                });
                let element = projects.create(tx, &ac, &request, None, &mut batch)?;
                let project = Project::from_element(element)
                    .ok_or_else(|| StoreError::corrupted(element.id(), "project"))?;

                let schemas = CollectionRoot::create_root(tx, RootKind::Schemas)?;
                for definition in [folder(), content()] {
                    let container =
                        SchemaContainer::create(tx, &ac, &schemas, &definition, None, &mut batch)?;
                    project.assign_schema(tx, &ac, &container)?;
                }
                Ok::<_, StoreError>((admin.clone(), project))
            })
            .unwrap();
        Fixture { db, admin, project }
    }

    fn field_map(pairs: &[(&str, &str)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect()
    }

    fn create_node(
        tx: &mut Transaction,
        f: &Fixture,
        schema: &str,
        parent: Option<ElementId>,
        values: &[(&str, &str)],
        batch: &mut SearchQueueBatch,
    ) -> Result<Element> {
        let ac = ActionContext::new(&f.admin, &GraphPermissions);
        let root = f.project.node_root(tx)?;
        let request = NodeCreateRequest {
            schema: SchemaReference::by_name(schema),
            parent,
            fields: field_map(values),
        };
        create(tx, &ac, &root, &request, None, batch)
    }

    #[test]
    fn node_without_parent_goes_below_base_node() {
        let f = fixture();
        let mut tx = f.db.begin();
        let mut batch = SearchQueueBatch::new();
        let node = create_node(&mut tx, &f, "content", None, &[("title", "Hello")], &mut batch)
            .unwrap();

        assert_eq!(parent(&tx, &node).unwrap(), Some(f.project.base_node(&tx).unwrap()));
        assert_eq!(node.name(&tx).unwrap().as_deref(), Some("Hello"));
        assert_eq!(schema_version(&tx, &node).unwrap().unwrap().revision(&tx).unwrap(), 1);
        assert_eq!(Project::of(&tx, &node).unwrap(), Some(f.project));
        assert_eq!(batch.operations()[0].index(), f.project.node_index_name());
    }

    #[test]
    fn only_container_nodes_accept_children() {
        let f = fixture();
        let mut tx = f.db.begin();
        let mut batch = SearchQueueBatch::new();
        let dir = create_node(&mut tx, &f, "folder", None, &[("name", "news")], &mut batch).unwrap();
        let page = create_node(&mut tx, &f, "content", Some(dir.id()), &[("title", "a")], &mut batch)
            .unwrap();
        assert_eq!(children(&tx, &dir).unwrap(), vec![page]);

        let err = create_node(&mut tx, &f, "content", Some(page.id()), &[("title", "b")], &mut batch)
            .unwrap_err();
        assert_eq!(err.message().unwrap().key, "node_parent_not_container");
    }

    #[test]
    fn fields_are_checked_against_schema() {
        let f = fixture();
        let mut tx = f.db.begin();
        let mut batch = SearchQueueBatch::new();

        let err = create_node(&mut tx, &f, "content", None, &[("teaser", "x")], &mut batch)
            .unwrap_err();
        assert_eq!(err.message().unwrap().key, "node_missing_required_field");

        let err = create_node(&mut tx, &f, "content", None, &[("title", "x"), ("color", "red")], &mut batch)
            .unwrap_err();
        assert_eq!(err.message().unwrap().params, vec!["color", "content"]);

        let err = create_node(&mut tx, &f, "gallery", None, &[], &mut batch).unwrap_err();
        assert_eq!(err.message().unwrap().key, "error_schema_reference_not_found");
        assert!(batch.is_empty());
    }

    #[test]
    fn unknown_parent_is_not_found() {
        let f = fixture();
        let mut tx = f.db.begin();
        let err = create_node(
            &mut tx,
            &f,
            "content",
            Some(ElementId::new()),
            &[("title", "x")],
            &mut SearchQueueBatch::new(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn delete_removes_subtree() {
        let f = fixture();
        let mut tx = f.db.begin();
        let mut batch = SearchQueueBatch::new();
        let dir = create_node(&mut tx, &f, "folder", None, &[("name", "news")], &mut batch).unwrap();
        let sub = create_node(&mut tx, &f, "folder", Some(dir.id()), &[("name", "2024")], &mut batch)
            .unwrap();
        let page = create_node(&mut tx, &f, "content", Some(sub.id()), &[("title", "a")], &mut batch)
            .unwrap();

        let mut batch = SearchQueueBatch::new();
        dir.delete(&mut tx, &mut batch).unwrap();
        for gone in [dir, sub, page] {
            assert!(!tx.contains_vertex(gone.vertex()));
        }
        assert_eq!(batch.len(), 3);
        assert!(tx.contains_vertex(f.project.base_node(&tx).unwrap().vertex()));
    }

    #[test]
    fn base_node_cannot_be_deleted_directly() {
        let f = fixture();
        let mut tx = f.db.begin();
        let base = f.project.base_node(&tx).unwrap();
        let err = base.delete(&mut tx, &mut SearchQueueBatch::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }
}
