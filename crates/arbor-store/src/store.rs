//! The store facade.
//!
//! Each workflow runs in one graph transaction and returns the search
//! operations it produced. Side effects outside the graph (route
//! registration) run after commit; a failed registration is compensated by
//! deleting what was just created.

use std::sync::Arc;

use arbor_core::models::{ProjectCreateRequest, SchemaReference, UserCreateRequest};
use arbor_core::{
    CreateRequest, ElementId, ElementKind, ErrorMessage, Page, PagingParameters, Permission,
    Principal, SchemaDefinition, SearchQueueBatch, StoreConfig,
};
use arbor_graph::{Database, GraphConfig, Transaction};
use serde::Serialize;

use crate::element::{Element, ElementView};
use crate::error::{Result, StoreError};
use crate::labels;
use crate::membership;
use crate::permissions::{ActionContext, GraphPermissions, PermissionPolicy};
use crate::project::Project;
use crate::root::{CollectionRoot, PathTarget, RootKind};
use crate::router::{InMemoryRoutes, RouteRegistry};
use crate::schema::{SchemaContainer, SchemaVersion};
use crate::user;

/// Roots hanging directly off the store root.
const TOP_ROOTS: [(RootKind, &str); 3] = [
    (RootKind::Projects, labels::HAS_PROJECT_ROOT),
    (RootKind::Users, labels::HAS_USER_ROOT),
    (RootKind::Schemas, labels::HAS_SCHEMA_ROOT),
];

/// A workflow result together with the search operations to dispatch once
/// the caller is done with it.
#[derive(Debug)]
pub struct Created<T> {
    pub value: T,
    pub batch: SearchQueueBatch,
}

/// One resolved schema version.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedSchema {
    pub container: ElementId,
    pub version: ElementId,
    pub revision: u32,
    pub definition: SchemaDefinition,
}

impl ResolvedSchema {
    fn load(tx: &Transaction, version: &SchemaVersion) -> Result<Self> {
        Ok(Self {
            container: version.container(tx)?.id(),
            version: version.id(),
            revision: version.revision(tx)?,
            definition: version.definition(tx)?,
        })
    }
}

pub struct Store {
    db: Database,
    config: StoreConfig,
    permissions: Arc<dyn PermissionPolicy>,
    routes: Arc<dyn RouteRegistry>,
}

impl Store {
    /// Wrap `db`, registering the edge indices the store queries through.
    pub fn new(db: Database, config: StoreConfig) -> Self {
        membership::register_indices(&db);
        Self {
            db,
            config,
            permissions: Arc::new(GraphPermissions),
            routes: Arc::new(InMemoryRoutes::new()),
        }
    }

    /// Open the configured snapshot, or start empty without one.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let graph_config = match &config.snapshot_path {
            Some(path) => GraphConfig::with_snapshot(path),
            None => GraphConfig::default(),
        };
        let db = Database::open(graph_config)?;
        tracing::info!(
            snapshot = ?config.snapshot_path,
            version = db.version(),
            "Store opened"
        );
        Ok(Self::new(db, config))
    }

    pub fn with_permissions(mut self, permissions: Arc<dyn PermissionPolicy>) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_routes(mut self, routes: Arc<dyn RouteRegistry>) -> Self {
        self.routes = routes;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn routes(&self) -> &Arc<dyn RouteRegistry> {
        &self.routes
    }

    /// Write the snapshot if one is configured.
    pub fn save(&self) -> Result<()> {
        if self.db.config().snapshot_path.is_some() {
            self.db.save_snapshot()?;
        }
        Ok(())
    }

    pub fn default_paging(&self) -> PagingParameters {
        PagingParameters::new(1, self.config.default_per_page)
    }

    fn ac<'a>(&'a self, principal: &'a Principal) -> ActionContext<'a> {
        ActionContext::new(principal, self.permissions.as_ref())
    }

    // ── Bootstrap ────────────────────────────────────────────────

    /// Create the store root, its top-level roots and the admin user where
    /// missing. Returns the admin principal. Safe to run on every start.
    pub fn bootstrap(&self) -> Result<Principal> {
        self.db.tx(|tx| {
            let store_root = match Self::find_store_root(tx)? {
                Some(root) => root,
                None => {
                    let root = Element::create(tx, ElementKind::StoreRoot, None)?;
                    tracing::info!(id = %root.id(), "Store root created");
                    root
                }
            };
            for (kind, label) in TOP_ROOTS {
                if store_root.out_one(tx, label)?.is_none() {
                    let root = CollectionRoot::create_root(tx, kind)?;
                    store_root.set_single_link_out_to(tx, &root.element(), &[label])?;
                }
            }

            let users = Self::top_root(tx, RootKind::Users)?;
            let username = &self.config.admin_username;
            let admin = match users.find_by_name(tx, username)? {
                Some(admin) => admin,
                None => {
                    let admin = user::provision(tx, &users, username, true, None, None)?;
                    tracing::info!(user = %username, id = %admin.id(), "Admin user created");
                    admin
                }
            };
            user::principal_for(tx, &admin)
        })
    }

    fn find_store_root(tx: &Transaction) -> Result<Option<Element>> {
        match tx.first_vertex_of_kind(ElementKind::StoreRoot.as_str()) {
            Some(vertex) => Ok(Some(Element::from_vertex(tx, vertex)?)),
            None => Ok(None),
        }
    }

    /// One of the roots below the store root.
    pub fn top_root(tx: &Transaction, kind: RootKind) -> Result<CollectionRoot> {
        let label = TOP_ROOTS
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, label)| *label)
            .ok_or_else(|| {
                StoreError::BadRequest(ErrorMessage::new(
                    "error_unknown_root_segment",
                    [kind.path_segment()],
                ))
            })?;
        let store_root = Self::find_store_root(tx)?.ok_or(StoreError::NotBootstrapped)?;
        CollectionRoot::typed(store_root.out_one(tx, label)?, kind)
            .ok_or(StoreError::NotBootstrapped)
    }

    pub fn project_root(&self, tx: &Transaction) -> Result<CollectionRoot> {
        Self::top_root(tx, RootKind::Projects)
    }

    pub fn user_root(&self, tx: &Transaction) -> Result<CollectionRoot> {
        Self::top_root(tx, RootKind::Users)
    }

    pub fn schema_root(&self, tx: &Transaction) -> Result<CollectionRoot> {
        Self::top_root(tx, RootKind::Schemas)
    }

    // ── Principals and grants ────────────────────────────────────

    /// The principal of the user named `username`.
    pub fn principal(&self, username: &str) -> Result<Principal> {
        self.db.read(|tx| {
            let user = self.user_root(tx)?.find_by_name(tx, username)?.ok_or_else(|| {
                StoreError::NotFound(ErrorMessage::new("object_not_found_for_name", [username]))
            })?;
            user::principal_for(tx, &user)
        })
    }

    /// Grant `permission` on an element to `grantee`. The granting principal
    /// needs update permission on the element.
    pub fn grant(
        &self,
        principal: &Principal,
        grantee: &Principal,
        element: ElementId,
        permission: Permission,
    ) -> Result<()> {
        let ac = self.ac(principal);
        self.db.tx(|tx| {
            let target = Element::find(tx, element)?.ok_or_else(|| StoreError::not_found(element))?;
            ac.require(tx, &target, Permission::Update)?;
            self.permissions
                .grant_permission(tx, grantee, &target, permission)?;
            tracing::info!(grantee = %grantee.name, %element, %permission, "Permission granted");
            Ok(())
        })
    }

    // ── Creation ─────────────────────────────────────────────────

    /// Create a member below the root `path` resolves to. Projects are also
    /// registered with the route registry after commit.
    pub fn create(
        &self,
        principal: &Principal,
        path: &str,
        request: CreateRequest,
        explicit_id: Option<ElementId>,
    ) -> Result<Created<ElementView>> {
        let ac = self.ac(principal);
        let created = self.db.tx(|tx| {
            let root = match self.resolve_in(tx, &ac, path)? {
                PathTarget::Root(root) => root,
                PathTarget::Element(element) => {
                    return Err(StoreError::BadRequest(ErrorMessage::new(
                        "error_request_kind_mismatch",
                        [request.kind().to_string(), element.kind().to_string()],
                    )))
                }
            };
            let mut batch = SearchQueueBatch::new();
            let element = root.create(tx, &ac, &request, explicit_id, &mut batch)?;
            Ok(Created {
                value: element.view(tx)?,
                batch,
            })
        })?;

        if let CreateRequest::Project(request) = &request {
            self.register_route(&request.name, created.value.id)?;
        }
        Ok(created)
    }

    /// Register the route of a committed project, deleting the project again
    /// if registration fails.
    fn register_route(&self, name: &str, id: ElementId) -> Result<()> {
        let Err(source) = self.routes.register_project(name, id) else {
            return Ok(());
        };
        tracing::warn!(project = %name, %id, error = %source, "Route registration failed, removing project");

        let rollback = self
            .db
            .tx(|tx| {
                let element = Element::find(tx, id)?.ok_or_else(|| StoreError::not_found(id))?;
                // The create batch was never handed out, so the delete batch has nothing to undo.
                element.delete(tx, &mut SearchQueueBatch::new())
            })
            .err();
        if let Some(e) = &rollback {
            tracing::error!(project = %name, %id, error = %e, "Project rollback failed");
        }
        Err(StoreError::SideEffect {
            source,
            rollback: rollback.map(Box::new),
        })
    }

    pub fn create_user(
        &self,
        principal: &Principal,
        request: UserCreateRequest,
    ) -> Result<Created<ElementView>> {
        self.create(principal, RootKind::Users.path_segment(), CreateRequest::User(request), None)
    }

    pub fn create_project(
        &self,
        principal: &Principal,
        request: ProjectCreateRequest,
    ) -> Result<Created<ElementView>> {
        self.create(
            principal,
            RootKind::Projects.path_segment(),
            CreateRequest::Project(request),
            None,
        )
    }

    /// Create a schema in the global schema root.
    pub fn create_schema(
        &self,
        principal: &Principal,
        definition: SchemaDefinition,
    ) -> Result<Created<ElementView>> {
        self.create(
            principal,
            RootKind::Schemas.path_segment(),
            CreateRequest::Schema(definition),
            None,
        )
    }

    // ── Schemas ──────────────────────────────────────────────────

    fn load_container(
        &self,
        tx: &Transaction,
        ac: &ActionContext<'_>,
        id: ElementId,
        permission: Permission,
    ) -> Result<SchemaContainer> {
        let element = self.schema_root(tx)?.load_by_uuid(tx, ac, id, permission)?;
        SchemaContainer::from_element(element).ok_or_else(|| StoreError::not_found(id))
    }

    fn load_project(
        &self,
        tx: &Transaction,
        ac: &ActionContext<'_>,
        id: ElementId,
        permission: Permission,
    ) -> Result<Project> {
        let element = self.project_root(tx)?.load_by_uuid(tx, ac, id, permission)?;
        Project::from_element(element).ok_or_else(|| StoreError::not_found(id))
    }

    pub fn append_schema_version(
        &self,
        principal: &Principal,
        container: ElementId,
        definition: SchemaDefinition,
    ) -> Result<Created<ResolvedSchema>> {
        let ac = self.ac(principal);
        self.db.tx(|tx| {
            let container = self.load_container(tx, &ac, container, Permission::Read)?;
            let mut batch = SearchQueueBatch::new();
            let version = container.append_version(tx, &ac, &definition, &mut batch)?;
            Ok(Created {
                value: ResolvedSchema::load(tx, &version)?,
                batch,
            })
        })
    }

    /// Make a schema available to a project. Returns false if it already was.
    pub fn assign_schema(
        &self,
        principal: &Principal,
        project: ElementId,
        schema: ElementId,
    ) -> Result<bool> {
        let ac = self.ac(principal);
        self.db.tx(|tx| {
            let project = self.load_project(tx, &ac, project, Permission::Read)?;
            let container = self.load_container(tx, &ac, schema, Permission::Read)?;
            project.assign_schema(tx, &ac, &container)
        })
    }

    pub fn unassign_schema(
        &self,
        principal: &Principal,
        project: ElementId,
        schema: ElementId,
    ) -> Result<bool> {
        let ac = self.ac(principal);
        self.db.tx(|tx| {
            let project = self.load_project(tx, &ac, project, Permission::Read)?;
            let container = self.load_container(tx, &ac, schema, Permission::Read)?;
            project.unassign_schema(tx, &ac, &container)
        })
    }

    /// Resolve a schema reference, against a project's schemas if `project`
    /// is given and the global schema root otherwise.
    pub fn resolve_schema(
        &self,
        principal: &Principal,
        project: Option<ElementId>,
        reference: &SchemaReference,
    ) -> Result<ResolvedSchema> {
        let ac = self.ac(principal);
        self.db.read(|tx| {
            let root = match project {
                Some(id) => self.load_project(tx, &ac, id, Permission::Read)?.schema_root(tx)?,
                None => self.schema_root(tx)?,
            };
            let version = SchemaContainer::resolve_reference(tx, &root, reference)?;
            ac.require(tx, &version.container(tx)?.element(), Permission::Read)?;
            ResolvedSchema::load(tx, &version)
        })
    }

    // ── Listing and paths ────────────────────────────────────────

    /// One page of the projects the principal may read.
    pub fn list_projects(
        &self,
        principal: &Principal,
        paging: &PagingParameters,
    ) -> Result<Page<ElementView>> {
        paging
            .validate(self.config.max_per_page)
            .map_err(StoreError::BadRequest)?;
        let ac = self.ac(principal);
        self.db.read(|tx| {
            let page = self
                .project_root(tx)?
                .list_visible(tx, &ac, paging, Some(Permission::Read))?;
            let items = page
                .items
                .iter()
                .map(|element| element.view(tx))
                .collect::<Result<Vec<_>>>()?;
            Ok(Page {
                items,
                current_page: page.current_page,
                per_page: page.per_page,
                page_count: page.page_count,
                total_count: page.total_count,
            })
        })
    }

    /// Resolve a slash-separated path such as `projects/<uuid>/nodes/<uuid>`.
    pub fn resolve_path(&self, principal: &Principal, path: &str) -> Result<ElementView> {
        let ac = self.ac(principal);
        self.db
            .read(|tx| self.resolve_in(tx, &ac, path)?.element().view(tx))
    }

    fn resolve_in(
        &self,
        tx: &Transaction,
        ac: &ActionContext<'_>,
        path: &str,
    ) -> Result<PathTarget> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let Some((first, rest)) = segments.split_first() else {
            return Err(StoreError::BadRequest(ErrorMessage::new(
                "error_unknown_root_segment",
                [path],
            )));
        };
        let kind = RootKind::from_segment(first)
            .filter(|kind| TOP_ROOTS.iter().any(|(k, _)| k == kind))
            .ok_or_else(|| {
                StoreError::BadRequest(ErrorMessage::new("error_unknown_root_segment", [*first]))
            })?;
        Self::top_root(tx, kind)?.resolve_path(tx, ac, rest)
    }

    // ── Deletion ─────────────────────────────────────────────────

    /// Delete the element `path` resolves to. Requires delete permission.
    /// Deleting a project also removes its route after commit; a failure
    /// there is reported as a side-effect error while the deletion stands.
    pub fn delete(&self, principal: &Principal, path: &str) -> Result<SearchQueueBatch> {
        let ac = self.ac(principal);
        let (element, name, batch) = self.db.tx(|tx| {
            let element = match self.resolve_in(tx, &ac, path)? {
                PathTarget::Element(element) => element,
                PathTarget::Root(root) => {
                    return Err(StoreError::unsupported_delete(root.kind().element_kind()))
                }
            };
            ac.require(tx, &element, Permission::Delete)?;
            let name = element.name(tx)?.unwrap_or_default();
            let mut batch = SearchQueueBatch::new();
            element.delete(tx, &mut batch)?;
            Ok::<_, StoreError>((element, name, batch))
        })?;

        if element.kind() == ElementKind::Project {
            self.routes
                .unregister_project(&name)
                .map_err(|source| StoreError::SideEffect {
                    source,
                    rollback: None,
                })?;
        }
        Ok(batch)
    }

    pub fn delete_project(&self, principal: &Principal, id: ElementId) -> Result<SearchQueueBatch> {
        self.delete(principal, &format!("{}/{id}", RootKind::Projects.path_segment()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::ErrorKind;

    fn store() -> (Store, Principal) {
        let store = Store::new(Database::new(GraphConfig::default()), StoreConfig::default());
        let admin = store.bootstrap().unwrap();
        (store, admin)
    }

    #[test]
    fn bootstrap_is_idempotent() {
        let (store, admin) = store();
        let vertices = store.database().read(|tx| Ok::<_, StoreError>(tx.vertex_count())).unwrap();
        let again = store.bootstrap().unwrap();
        assert_eq!(again.id, admin.id);
        assert!(again.admin);
        let after = store.database().read(|tx| Ok::<_, StoreError>(tx.vertex_count())).unwrap();
        assert_eq!(vertices, after);
    }

    #[test]
    fn top_roots_need_bootstrap() {
        let store = Store::new(Database::new(GraphConfig::default()), StoreConfig::default());
        let err = store.database().read(|tx| store.project_root(tx)).unwrap_err();
        assert!(matches!(err, StoreError::NotBootstrapped));
    }

    #[test]
    fn principal_by_username() {
        let (store, admin) = store();
        assert_eq!(store.principal("admin").unwrap(), admin);
        let err = store.principal("nobody").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn root_paths_and_unknown_segments() {
        let (store, admin) = store();
        let view = store.resolve_path(&admin, "/projects").unwrap();
        assert_eq!(view.kind, ElementKind::ProjectRoot);

        let err = store.resolve_path(&admin, "tags").unwrap_err();
        assert_eq!(err.message().unwrap().key, "error_unknown_root_segment");
        let err = store.resolve_path(&admin, "").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }

    #[test]
    fn roots_cannot_be_deleted_through_paths() {
        let (store, admin) = store();
        let err = store.delete(&admin, "users").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn paging_is_validated() {
        let (store, admin) = store();
        let err = store
            .list_projects(&admin, &PagingParameters::new(1, 5000))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        let page = store.list_projects(&admin, &store.default_paging()).unwrap();
        assert!(page.items.is_empty());
    }
}
