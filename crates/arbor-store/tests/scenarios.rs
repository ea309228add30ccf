//! End-to-end store scenarios: visibility, schema versioning, error
//! precedence, uniqueness races, post-commit compensation and persistence.
//!
//! Run with: cargo test --package arbor-store --test scenarios

use std::sync::Arc;

use arbor_core::models::{
    NodeCreateRequest, ProjectCreateRequest, SchemaReference, TagCreateRequest,
    TagFamilyCreateRequest, UserCreateRequest,
};
use arbor_core::{
    CreateRequest, ElementId, ElementKind, ErrorKind, FieldSchema, FieldType, IndexOperation,
    PagingParameters, Permission, Principal, SchemaDefinition, SearchQueueBatch, StoreConfig,
};
use arbor_graph::{Database, GraphConfig};
use arbor_store::labels;
use arbor_store::{
    ActionContext, GraphPermissions, InMemoryRoutes, Project, RecordingIndex, RootKind,
    SearchQueue, Store, StoreError,
};

fn store() -> (Store, Principal) {
    let store = Store::new(Database::new(GraphConfig::default()), StoreConfig::default());
    let admin = store.bootstrap().unwrap();
    (store, admin)
}

fn project(store: &Store, admin: &Principal, name: &str) -> ElementId {
    store
        .create_project(
            admin,
            ProjectCreateRequest {
                name: name.to_string(),
            },
        )
        .unwrap()
        .value
        .id
}

fn user(store: &Store, admin: &Principal, username: &str) -> Principal {
    store
        .create_user(
            admin,
            UserCreateRequest {
                username: username.to_string(),
                admin: false,
            },
        )
        .unwrap();
    store.principal(username).unwrap()
}

/// Sub-roots, base node and grants of a project.
#[derive(Debug, PartialEq)]
struct ProjectParts {
    sub_roots: Vec<ElementId>,
    base_node: ElementId,
    grants: Vec<(ElementId, ElementId, &'static str)>,
}

fn project_parts(store: &Store, id: ElementId) -> ProjectParts {
    store
        .database()
        .read(|tx| {
            let element = store.project_root(tx)?.load_by_uuid_no_perm(tx, id)?;
            let project = Project::from_element(element).unwrap();
            let base_node = project.base_node(tx)?;
            let mut owned = vec![element, base_node];
            let mut sub_roots = Vec::new();
            for kind in [
                RootKind::Nodes,
                RootKind::Tags,
                RootKind::TagFamilies,
                RootKind::Schemas,
            ] {
                let root = project.sub_root(tx, kind)?.element();
                sub_roots.push(root.id());
                owned.push(root);
            }
            let mut grants = Vec::new();
            for element in &owned {
                for permission in Permission::ALL {
                    for user in element.in_elements(tx, permission.edge_label())? {
                        grants.push((user.id(), element.id(), permission.edge_label()));
                    }
                }
            }
            grants.sort();
            Ok::<_, StoreError>(ProjectParts {
                sub_roots,
                base_node: base_node.id(),
                grants,
            })
        })
        .unwrap()
}

fn content_schema() -> SchemaDefinition {
    SchemaDefinition::new("content")
        .with_display_field("title")
        .with_field(FieldSchema::new("title", FieldType::String).required())
}

// ── Visibility ───────────────────────────────────────────────────

#[test]
fn reader_lists_only_readable_projects() {
    let (store, admin) = store();
    let alpha = project(&store, &admin, "alpha");
    project(&store, &admin, "beta");

    let err = store
        .create_project(
            &admin,
            ProjectCreateRequest {
                name: "alpha".to_string(),
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let reader = user(&store, &admin, "reader");
    store.grant(&admin, &reader, alpha, Permission::Read).unwrap();

    let page = store.list_projects(&reader, &store.default_paging()).unwrap();
    let names: Vec<_> = page.items.iter().filter_map(|v| v.name.clone()).collect();
    assert_eq!(names, vec!["alpha".to_string()]);
    assert_eq!(page.total_count, 1);

    let all = store.list_projects(&admin, &store.default_paging()).unwrap();
    assert_eq!(all.total_count, 2);
}

#[test]
fn duplicate_project_name_leaves_original_untouched() {
    let routes = Arc::new(InMemoryRoutes::new());
    let (store, admin) = store();
    let store = store.with_routes(routes.clone());
    let alpha = project(&store, &admin, "alpha");
    let reader = user(&store, &admin, "reader");
    store.grant(&admin, &reader, alpha, Permission::Read).unwrap();

    let before = project_parts(&store, alpha);
    assert_eq!(before.sub_roots.len(), 4);
    let (vertices, edges) = {
        let tx = store.database().begin();
        (tx.vertex_count(), tx.edge_count())
    };

    let err = store
        .create_project(
            &admin,
            ProjectCreateRequest {
                name: "alpha".to_string(),
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Conflict { conflicting: Some(id), .. } if id == alpha
    ));

    assert_eq!(project_parts(&store, alpha), before);
    let tx = store.database().begin();
    assert_eq!((tx.vertex_count(), tx.edge_count()), (vertices, edges));
    drop(tx);
    assert_eq!(routes.routes().get("alpha"), Some(&alpha));
    assert_eq!(routes.routes().len(), 1);
    assert!(store.resolve_path(&reader, &format!("projects/{alpha}")).is_ok());
}

#[test]
fn listing_pages_through_projects() {
    let (store, admin) = store();
    for name in ["a", "b", "c", "d", "e"] {
        project(&store, &admin, name);
    }
    let page = store
        .list_projects(&admin, &PagingParameters::new(2, 2))
        .unwrap();
    let names: Vec<_> = page.items.iter().filter_map(|v| v.name.clone()).collect();
    assert_eq!(names, vec!["c".to_string(), "d".to_string()]);
    assert_eq!(page.page_count, 3);
    assert_eq!(page.total_count, 5);
}

// ── Error precedence ─────────────────────────────────────────────

#[test]
fn missing_element_is_not_found_before_forbidden() {
    let (store, admin) = store();
    let beta = project(&store, &admin, "beta");
    let reader = user(&store, &admin, "reader");

    let err = store
        .resolve_path(&reader, &format!("projects/{}", ElementId::new()))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = store
        .resolve_path(&reader, &format!("projects/{beta}"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let err = store.resolve_path(&reader, "projects/not-a-uuid").unwrap_err();
    assert_eq!(err.message().unwrap().key, "error_invalid_uuid");
}

// ── Schemas ──────────────────────────────────────────────────────

#[test]
fn schema_versions_are_appended_and_resolvable() {
    let (store, admin) = store();
    let created = store.create_schema(&admin, content_schema()).unwrap();
    let container = created.value.id;
    assert_eq!(created.batch.len(), 1);

    let mut broken = content_schema();
    broken.name = "teaser".to_string();
    broken.display_field = Some(String::new());
    let err = store.create_schema(&admin, broken).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
    let err = store
        .resolve_schema(&admin, None, &SchemaReference::by_name("teaser"))
        .unwrap_err();
    assert_eq!(err.message().unwrap().key, "error_schema_reference_not_found");

    let second = content_schema().with_field(FieldSchema::new("body", FieldType::Html));
    let appended = store
        .append_schema_version(&admin, container, second)
        .unwrap();
    assert_eq!(appended.value.revision, 2);
    assert_eq!(appended.value.container, container);

    let latest = store
        .resolve_schema(&admin, None, &SchemaReference::by_name("content"))
        .unwrap();
    assert_eq!(latest.revision, 2);
    assert_eq!(latest.definition.fields.len(), 2);

    let first = store
        .resolve_schema(&admin, None, &SchemaReference::by_name("content").with_version(1))
        .unwrap();
    assert_eq!(first.revision, 1);
    assert_eq!(first.definition, content_schema());

    let by_uuid = store
        .resolve_schema(&admin, None, &SchemaReference::by_uuid(container))
        .unwrap();
    assert_eq!(by_uuid.version, latest.version);

    let err = store
        .resolve_schema(&admin, None, &SchemaReference::by_name("content").with_version(7))
        .unwrap_err();
    assert_eq!(
        err.message().unwrap().params,
        vec!["content".to_string(), "-".to_string(), "7".to_string()]
    );
}

#[test]
fn schema_name_cannot_change_between_versions() {
    let (store, admin) = store();
    let container = store.create_schema(&admin, content_schema()).unwrap().value.id;
    let mut renamed = content_schema();
    renamed.name = "article".to_string();
    let err = store
        .append_schema_version(&admin, container, renamed)
        .unwrap_err();
    assert_eq!(err.message().unwrap().key, "schema_error_name_immutable");
}

// ── Project content ──────────────────────────────────────────────

#[test]
fn content_is_created_and_resolved_through_project_paths() {
    let (store, admin) = store();
    let alpha = project(&store, &admin, "alpha");
    let schema = store.create_schema(&admin, content_schema()).unwrap().value.id;
    assert!(store.assign_schema(&admin, alpha, schema).unwrap());
    assert!(!store.assign_schema(&admin, alpha, schema).unwrap());

    let family = store
        .create(
            &admin,
            &format!("projects/{alpha}/tagFamilies"),
            CreateRequest::TagFamily(TagFamilyCreateRequest {
                name: "colors".to_string(),
            }),
            None,
        )
        .unwrap()
        .value;
    let tag = store
        .create(
            &admin,
            &format!("projects/{alpha}/tags"),
            CreateRequest::Tag(TagCreateRequest {
                name: "red".to_string(),
                tag_family: family.id,
            }),
            None,
        )
        .unwrap()
        .value;
    assert_eq!(tag.kind, ElementKind::Tag);

    let mut fields = serde_json::Map::new();
    fields.insert("title".to_string(), serde_json::json!("Hello"));
    let node_id = ElementId::new();
    let node = store
        .create(
            &admin,
            &format!("projects/{alpha}/nodes"),
            CreateRequest::Node(NodeCreateRequest {
                schema: SchemaReference::by_name("content"),
                parent: None,
                fields,
            }),
            Some(node_id),
        )
        .unwrap();
    assert_eq!(node.value.id, node_id);
    assert_eq!(
        node.batch.operations()[0].index(),
        format!("node-{alpha}")
    );

    let view = store
        .resolve_path(&admin, &format!("projects/{alpha}/nodes/{node_id}"))
        .unwrap();
    assert_eq!(view.name.as_deref(), Some("Hello"));

    let root = store
        .resolve_path(&admin, &format!("projects/{alpha}/schemas"))
        .unwrap();
    assert_eq!(root.kind, ElementKind::SchemaRoot);

    let err = store
        .resolve_path(&admin, &format!("projects/{alpha}/members"))
        .unwrap_err();
    assert_eq!(err.message().unwrap().params, vec!["members".to_string()]);
}

#[test]
fn schema_in_use_cannot_be_deleted() {
    let (store, admin) = store();
    let alpha = project(&store, &admin, "alpha");
    let schema = store.create_schema(&admin, content_schema()).unwrap().value.id;
    store.assign_schema(&admin, alpha, schema).unwrap();

    let mut fields = serde_json::Map::new();
    fields.insert("title".to_string(), serde_json::json!("Hello"));
    store
        .create(
            &admin,
            &format!("projects/{alpha}/nodes"),
            CreateRequest::Node(NodeCreateRequest {
                schema: SchemaReference::by_uuid(schema),
                parent: None,
                fields,
            }),
            None,
        )
        .unwrap();

    let err = store.delete(&admin, &format!("schemas/{schema}")).unwrap_err();
    assert_eq!(err.message().unwrap().key, "schema_delete_still_in_use");

    // Deleting the project removes the nodes; the schema survives it.
    store.delete_project(&admin, alpha).unwrap();
    store.delete(&admin, &format!("schemas/{schema}")).unwrap();
}

#[test]
fn schema_created_under_project_outlives_it_in_global_root() {
    let (store, admin) = store();
    let alpha = project(&store, &admin, "alpha");
    let schema = store
        .create(
            &admin,
            &format!("projects/{alpha}/schemas"),
            CreateRequest::Schema(content_schema()),
            None,
        )
        .unwrap()
        .value
        .id;

    let view = store.resolve_path(&admin, &format!("schemas/{schema}")).unwrap();
    assert_eq!(view.kind, ElementKind::SchemaContainer);
    assert!(store
        .resolve_path(&admin, &format!("projects/{alpha}/schemas/{schema}"))
        .is_ok());
    let err = store.create_schema(&admin, content_schema()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    store.delete_project(&admin, alpha).unwrap();
    assert!(store.resolve_path(&admin, &format!("schemas/{schema}")).is_ok());

    store.delete(&admin, &format!("schemas/{schema}")).unwrap();
    let tx = store.database().begin();
    assert!(tx.vertices_of_kind("SchemaContainer").is_empty());
    assert!(tx.vertices_of_kind("SchemaVersion").is_empty());
}

#[test]
fn roots_cannot_be_deleted() {
    let (store, admin) = store();
    let err = store.delete(&admin, "projects").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
    let message = err.message().unwrap();
    assert_eq!(message.key, "error_delete_not_supported");
    assert_eq!(message.params, vec!["ProjectRoot".to_string()]);
}

// ── Uniqueness races ─────────────────────────────────────────────

#[test]
fn concurrent_duplicate_project_names_both_commit() {
    let (store, admin) = store();
    let db = store.database();
    let ac = ActionContext::new(&admin, &GraphPermissions);
    let request = CreateRequest::Project(ProjectCreateRequest {
        name: "gamma".to_string(),
    });

    let mut first = db.begin();
    let mut second = db.begin();
    let root = store.project_root(&first).unwrap();
    root.create(&mut first, &ac, &request, None, &mut SearchQueueBatch::new())
        .unwrap();
    root.create(&mut second, &ac, &request, None, &mut SearchQueueBatch::new())
        .unwrap();
    first.commit().unwrap();
    second.commit().unwrap();

    let page = store.list_projects(&admin, &store.default_paging()).unwrap();
    let gammas = page
        .items
        .iter()
        .filter(|v| v.name.as_deref() == Some("gamma"))
        .count();
    assert_eq!(gammas, 2);
}

#[test]
fn concurrent_add_member_duplicates_edge() {
    let (store, admin) = store();
    let alpha = project(&store, &admin, "alpha");
    let schema = store.create_schema(&admin, content_schema()).unwrap().value.id;
    let db = store.database();

    let mut first = db.begin();
    let mut second = db.begin();
    let project_root = store.project_root(&first).unwrap();
    let project = arbor_store::Project::from_element(
        project_root.find_by_uuid(&first, alpha).unwrap().unwrap(),
    )
    .unwrap();
    let schemas = project.schema_root(&first).unwrap();
    let container = store
        .schema_root(&first)
        .unwrap()
        .find_by_uuid(&first, schema)
        .unwrap()
        .unwrap();

    assert!(schemas.add_member(&mut first, &container).unwrap());
    assert!(schemas.add_member(&mut second, &container).unwrap());
    first.commit().unwrap();
    second.commit().unwrap();

    let tx = db.begin();
    let edges = tx.edges_between(
        schemas.element().vertex(),
        container.vertex(),
        labels::HAS_SCHEMA_CONTAINER_ITEM,
    );
    assert_eq!(edges.len(), 2);
    assert!(schemas.contains(&tx, &container).unwrap());
}

#[test]
fn concurrent_create_with_same_explicit_id_conflicts() {
    let (store, admin) = store();
    let db = store.database();
    let ac = ActionContext::new(&admin, &GraphPermissions);
    let id = ElementId::new();

    let mut first = db.begin();
    let mut second = db.begin();
    let root = store.user_root(&first).unwrap();
    for (tx, name) in [(&mut first, "ann"), (&mut second, "bob")] {
        let request = CreateRequest::User(UserCreateRequest {
            username: name.to_string(),
            admin: false,
        });
        root.create(tx, &ac, &request, Some(id), &mut SearchQueueBatch::new())
            .unwrap();
    }
    first.commit().unwrap();
    let err = StoreError::from(second.commit().unwrap_err());
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

// ── Side effects ─────────────────────────────────────────────────

#[test]
fn failed_route_registration_removes_project() {
    let routes = Arc::new(InMemoryRoutes::new());
    let (store, admin) = store();
    let store = store.with_routes(routes.clone());

    routes.fail_next();
    let err = store
        .create_project(
            &admin,
            ProjectCreateRequest {
                name: "alpha".to_string(),
            },
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::SideEffect { rollback: None, .. }));
    assert!(!routes.contains("alpha"));
    let page = store.list_projects(&admin, &store.default_paging()).unwrap();
    assert!(page.items.is_empty());

    let alpha = project(&store, &admin, "alpha");
    assert_eq!(routes.routes().get("alpha"), Some(&alpha));
}

#[test]
fn delete_project_emits_batch_and_unregisters_route() {
    let routes = Arc::new(InMemoryRoutes::new());
    let (store, admin) = store();
    let store = store.with_routes(routes.clone());
    let alpha = project(&store, &admin, "alpha");

    let batch = store.delete_project(&admin, alpha).unwrap();
    assert!(batch.operations().contains(&IndexOperation::DeleteDocument {
        index: "project".to_string(),
        document_id: alpha,
    }));
    assert_eq!(
        batch.operations().last(),
        Some(&IndexOperation::DropIndex {
            index: format!("node-{alpha}")
        })
    );
    assert!(!routes.contains("alpha"));

    let err = store.resolve_path(&admin, &format!("projects/{alpha}")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn delete_requires_delete_permission() {
    let (store, admin) = store();
    let alpha = project(&store, &admin, "alpha");
    let reader = user(&store, &admin, "reader");
    store.grant(&admin, &reader, alpha, Permission::Read).unwrap();

    let err = store.delete_project(&reader, alpha).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    assert!(store.resolve_path(&reader, &format!("projects/{alpha}")).is_ok());
}

// ── Persistence and dispatch ─────────────────────────────────────

#[test]
fn snapshot_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig {
        snapshot_path: Some(dir.path().join("graph.json").display().to_string()),
        ..StoreConfig::default()
    };

    let store = Store::open(config.clone()).unwrap();
    let admin = store.bootstrap().unwrap();
    let alpha = project(&store, &admin, "alpha");
    store.save().unwrap();
    drop(store);

    let store = Store::open(config).unwrap();
    let again = store.bootstrap().unwrap();
    assert_eq!(again.id, admin.id);
    let view = store.resolve_path(&again, &format!("projects/{alpha}")).unwrap();
    assert_eq!(view.name.as_deref(), Some("alpha"));
    assert_eq!(view.creator, Some(admin.id));
}

#[tokio::test]
async fn batches_dispatch_with_prefix() {
    let (store, admin) = store();
    let index = Arc::new(RecordingIndex::new());
    let queue = SearchQueue::spawn(index.clone(), Some("test-".to_string()), 8);

    let created = store
        .create_project(
            &admin,
            ProjectCreateRequest {
                name: "alpha".to_string(),
            },
        )
        .unwrap();
    let alpha = created.value.id;
    queue.enqueue(created.batch).await.unwrap();
    queue
        .enqueue(store.delete_project(&admin, alpha).unwrap())
        .await
        .unwrap();
    let stats = queue.shutdown().await.unwrap();

    assert_eq!(stats.batches, 2);
    assert_eq!(stats.failed, 0);
    let operations = index.operations();
    assert_eq!(
        operations.first(),
        Some(&IndexOperation::CreateDocument {
            index: "test-project".to_string(),
            document_id: alpha,
            kind: ElementKind::Project,
        })
    );
    assert!(operations.iter().all(|op| op.index().starts_with("test-")));
}
