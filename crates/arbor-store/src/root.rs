//! Collection roots: elements aggregating a homogeneous member set through
//! one membership label.

use arbor_core::{
    CreateRequest, ElementId, ElementKind, ErrorMessage, Page, PagingParameters, Permission,
    SearchQueueBatch,
};
use arbor_graph::Transaction;

use crate::element::Element;
use crate::error::{Result, StoreError};
use crate::permissions::ActionContext;
use crate::project::Project;
use crate::{labels, membership};

/// The closed set of collection kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootKind {
    Projects,
    Users,
    Schemas,
    TagFamilies,
    Tags,
    Nodes,
}

impl RootKind {
    pub const ALL: [RootKind; 6] = [
        RootKind::Projects,
        RootKind::Users,
        RootKind::Schemas,
        RootKind::TagFamilies,
        RootKind::Tags,
        RootKind::Nodes,
    ];

    /// Kind of the root element itself.
    pub fn element_kind(&self) -> ElementKind {
        match self {
            Self::Projects => ElementKind::ProjectRoot,
            Self::Users => ElementKind::UserRoot,
            Self::Schemas => ElementKind::SchemaRoot,
            Self::TagFamilies => ElementKind::TagFamilyRoot,
            Self::Tags => ElementKind::TagRoot,
            Self::Nodes => ElementKind::NodeRoot,
        }
    }

    /// Kind every member must have.
    pub fn member_kind(&self) -> ElementKind {
        match self {
            Self::Projects => ElementKind::Project,
            Self::Users => ElementKind::User,
            Self::Schemas => ElementKind::SchemaContainer,
            Self::TagFamilies => ElementKind::TagFamily,
            Self::Tags => ElementKind::Tag,
            Self::Nodes => ElementKind::Node,
        }
    }

    pub fn member_label(&self) -> &'static str {
        match self {
            Self::Projects => labels::HAS_PROJECT,
            Self::Users => labels::HAS_USER,
            Self::Schemas => labels::HAS_SCHEMA_CONTAINER_ITEM,
            Self::TagFamilies => labels::HAS_TAG_FAMILY,
            Self::Tags => labels::HAS_TAG,
            Self::Nodes => labels::HAS_NODE,
        }
    }

    /// Path segment naming this collection.
    pub fn path_segment(&self) -> &'static str {
        match self {
            Self::Projects => "projects",
            Self::Users => "users",
            Self::Schemas => "schemas",
            Self::TagFamilies => "tagFamilies",
            Self::Tags => "tags",
            Self::Nodes => "nodes",
        }
    }

    pub fn from_segment(segment: &str) -> Option<RootKind> {
        Self::ALL
            .iter()
            .find(|k| k.path_segment() == segment)
            .copied()
    }

    pub fn from_element_kind(kind: ElementKind) -> Option<RootKind> {
        Self::ALL.iter().find(|k| k.element_kind() == kind).copied()
    }
}

/// Result of resolving a path against nested roots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathTarget {
    Root(CollectionRoot),
    Element(Element),
}

impl PathTarget {
    pub fn element(&self) -> Element {
        match self {
            Self::Root(root) => root.element(),
            Self::Element(element) => *element,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CollectionRoot {
    element: Element,
    kind: RootKind,
}

impl CollectionRoot {
    /// Create a new, empty root element of `kind`.
    pub fn create_root(tx: &mut Transaction, kind: RootKind) -> Result<CollectionRoot> {
        let element = Element::create(tx, kind.element_kind(), None)?;
        Ok(CollectionRoot { element, kind })
    }

    /// View an existing element as a collection root.
    pub fn from_element(element: Element) -> Option<CollectionRoot> {
        RootKind::from_element_kind(element.kind()).map(|kind| CollectionRoot { element, kind })
    }

    /// `element` as a root, if it is one of `kind`.
    pub(crate) fn typed(element: Option<Element>, kind: RootKind) -> Option<CollectionRoot> {
        element
            .and_then(Self::from_element)
            .filter(|root| root.kind == kind)
    }

    pub fn element(&self) -> Element {
        self.element
    }

    pub fn id(&self) -> ElementId {
        self.element.id()
    }

    pub fn kind(&self) -> RootKind {
        self.kind
    }

    pub fn member_label(&self) -> &'static str {
        self.kind.member_label()
    }

    // ── Lookup ───────────────────────────────────────────────────

    /// Resolve an identity to a member of this root.
    ///
    /// The global identity index finds the candidate wherever it lives; the
    /// membership index then confirms it belongs here. An identity that exists
    /// under another root resolves to `None`.
    pub fn find_by_uuid(&self, tx: &Transaction, id: ElementId) -> Result<Option<Element>> {
        let Some(candidate) = Element::find_of_kind(tx, self.kind.member_kind(), id) else {
            return Ok(None);
        };
        if self.contains(tx, &candidate)? {
            Ok(Some(candidate))
        } else {
            Ok(None)
        }
    }

    /// Like [`find_by_uuid`](Self::find_by_uuid), then check `permission`.
    /// A missing member is NotFound even where permission would be lacking.
    pub fn load_by_uuid(
        &self,
        tx: &Transaction,
        ac: &ActionContext<'_>,
        id: ElementId,
        permission: Permission,
    ) -> Result<Element> {
        let element = self.load_by_uuid_no_perm(tx, id)?;
        ac.require(tx, &element, permission)?;
        Ok(element)
    }

    pub fn load_by_uuid_no_perm(&self, tx: &Transaction, id: ElementId) -> Result<Element> {
        self.find_by_uuid(tx, id)?
            .ok_or_else(|| StoreError::not_found(id))
    }

    /// First member whose name equals `name`. Names are expected, not
    /// guaranteed, to be unique within a root.
    pub fn find_by_name(&self, tx: &Transaction, name: &str) -> Result<Option<Element>> {
        for member in self.members(tx) {
            let member = member?;
            if member.name(tx)?.as_deref() == Some(name) {
                return Ok(Some(member));
            }
        }
        Ok(None)
    }

    pub fn load_by_name(
        &self,
        tx: &Transaction,
        ac: &ActionContext<'_>,
        name: &str,
        permission: Permission,
    ) -> Result<Element> {
        let element = self.find_by_name(tx, name)?.ok_or_else(|| {
            StoreError::NotFound(ErrorMessage::new("object_not_found_for_name", [name]))
        })?;
        ac.require(tx, &element, permission)?;
        Ok(element)
    }

    pub fn contains(&self, tx: &Transaction, element: &Element) -> Result<bool> {
        membership::is_member(tx, &self.element, element, self.member_label())
    }

    // ── Listing ──────────────────────────────────────────────────

    /// Members in insertion order, resolved lazily.
    pub fn members<'a>(&self, tx: &'a Transaction) -> impl Iterator<Item = Result<Element>> + 'a {
        tx.out_vertices(self.element.vertex(), self.kind.member_label())
            .map(move |v| Element::from_vertex(tx, v))
    }

    /// One page of the members the principal holds `permission` on. Without
    /// a permission every member is listed.
    pub fn list_visible(
        &self,
        tx: &Transaction,
        ac: &ActionContext<'_>,
        paging: &PagingParameters,
        permission: Option<Permission>,
    ) -> Result<Page<Element>> {
        let offset = paging.offset();
        let per_page = paging.per_page as usize;
        let mut items = Vec::with_capacity(per_page.min(64));
        let mut total: u64 = 0;

        for member in self.members(tx) {
            let member = member?;
            if let Some(permission) = permission {
                if !ac.has_permission(tx, &member, permission)? {
                    continue;
                }
            }
            if total as usize >= offset && items.len() < per_page {
                items.push(member);
            }
            total += 1;
        }

        Ok(Page::new(items, paging, total))
    }

    // ── Membership ───────────────────────────────────────────────

    /// Add `item` unless it is already a member. Returns whether an edge was
    /// created.
    ///
    /// The membership check and the edge insert are two steps. Two
    /// transactions adding the same pair concurrently both see no edge and
    /// both commit one, leaving duplicate membership edges; the engine only
    /// serialises writes to the same vertex or edge.
    pub fn add_member(&self, tx: &mut Transaction, item: &Element) -> Result<bool> {
        if self.contains(tx, item)? {
            return Ok(false);
        }
        self.element.link_out(tx, item, self.member_label())?;
        Ok(true)
    }

    /// Remove the membership edge to `item`. No-op if absent.
    pub fn remove_member(&self, tx: &mut Transaction, item: &Element) -> Result<bool> {
        let edges = membership::edges(tx, &self.element, item, self.member_label())?;
        for edge in &edges {
            tx.remove_edge(*edge)?;
        }
        Ok(!edges.is_empty())
    }

    // ── Creation ─────────────────────────────────────────────────

    /// Create a member from `request`, using `explicit_id` if given.
    ///
    /// Each kind validates its request, checks create permission on this root
    /// and name uniqueness, then adds the new element as a member. Any failure
    /// leaves the member set unchanged.
    pub fn create(
        &self,
        tx: &mut Transaction,
        ac: &ActionContext<'_>,
        request: &CreateRequest,
        explicit_id: Option<ElementId>,
        batch: &mut SearchQueueBatch,
    ) -> Result<Element> {
        match (self.kind, request) {
            (RootKind::Projects, CreateRequest::Project(req)) => {
                crate::project::create(tx, ac, self, req, explicit_id, batch)
            }
            (RootKind::Users, CreateRequest::User(req)) => {
                crate::user::create(tx, ac, self, req, explicit_id, batch)
            }
            (RootKind::Schemas, CreateRequest::Schema(definition)) => {
                crate::schema::SchemaContainer::create(tx, ac, self, definition, explicit_id, batch)
                    .map(|container| container.element())
            }
            (RootKind::TagFamilies, CreateRequest::TagFamily(req)) => {
                crate::tag::create_tag_family(tx, ac, self, req, explicit_id, batch)
            }
            (RootKind::Tags, CreateRequest::Tag(req)) => {
                crate::tag::create_tag(tx, ac, self, req, explicit_id, batch)
            }
            (RootKind::Nodes, CreateRequest::Node(req)) => {
                crate::node::create(tx, ac, self, req, explicit_id, batch)
            }
            (kind, request) => Err(StoreError::BadRequest(ErrorMessage::new(
                "error_request_kind_mismatch",
                [
                    request.kind().to_string(),
                    kind.member_kind().to_string(),
                ],
            ))),
        }
    }

    /// Fail with Conflict if a member already uses `name`.
    pub(crate) fn check_name_free(&self, tx: &Transaction, name: &str, conflict_key: &str) -> Result<()> {
        match self.find_by_name(tx, name)? {
            Some(existing) => Err(StoreError::conflict(
                ErrorMessage::new(conflict_key, [name]),
                Some(existing.id()),
            )),
            None => Ok(()),
        }
    }

    // ── Paths ────────────────────────────────────────────────────

    /// Resolve the remaining path segments below this root.
    ///
    /// No segments resolve to the root itself and one segment to a readable
    /// member. Longer paths continue into a project's sub-roots; under any
    /// other root they fail naming the segment that can't be resolved.
    pub fn resolve_path(
        &self,
        tx: &Transaction,
        ac: &ActionContext<'_>,
        segments: &[&str],
    ) -> Result<PathTarget> {
        match segments {
            [] => Ok(PathTarget::Root(*self)),
            [id] => {
                let id = parse_id(id)?;
                Ok(PathTarget::Element(self.load_by_uuid(tx, ac, id, Permission::Read)?))
            }
            [id, rest @ ..] if self.kind == RootKind::Projects => {
                let element = self.load_by_uuid(tx, ac, parse_id(id)?, Permission::Read)?;
                Project::from_element(element)
                    .ok_or_else(|| StoreError::not_found(element.id()))?
                    .resolve_path(tx, ac, rest)
            }
            [_, next, ..] => Err(StoreError::BadRequest(ErrorMessage::new(
                "error_path_segment_unresolvable",
                [*next],
            ))),
        }
    }
}

/// Fail with BadRequest if `name` is blank.
pub(crate) fn require_name(name: &str, missing_key: &str) -> Result<()> {
    if name.trim().is_empty() {
        Err(StoreError::BadRequest(ErrorMessage::key(missing_key)))
    } else {
        Ok(())
    }
}

pub(crate) fn parse_id(segment: &str) -> Result<ElementId> {
    segment
        .parse()
        .map_err(|_| StoreError::BadRequest(ErrorMessage::new("error_invalid_uuid", [segment])))
}

/// Delete a project sub-root and the members it owns. A schema container
/// that another schema root still holds only loses this membership.
pub(crate) fn delete_sub_root(
    tx: &mut Transaction,
    root: CollectionRoot,
    batch: &mut SearchQueueBatch,
) -> Result<()> {
    let members = root.members(tx).collect::<Result<Vec<_>>>()?;
    for member in members {
        // Cascades earlier in the loop may already have removed it.
        if !tx.contains_vertex(member.vertex()) {
            continue;
        }
        match root.kind {
            RootKind::Schemas => {
                let holders = tx
                    .in_vertices(member.vertex(), root.member_label())
                    .filter(|holder| *holder != root.element.vertex())
                    .count();
                if holders == 0 {
                    member.delete(tx, batch)?;
                }
            }
            RootKind::Nodes => crate::node::delete_subtree(tx, member, batch)?,
            _ => member.delete(tx, batch)?,
        }
    }
    root.element.remove(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::{ErrorKind, Principal};
    use arbor_graph::{Database, GraphConfig};

    use crate::permissions::{GraphPermissions, PermissionPolicy};

    struct Fixture {
        db: Database,
        reader: Principal,
        root: CollectionRoot,
        other_root: CollectionRoot,
        tags: Vec<Element>,
    }

    fn fixture(n: usize) -> Fixture {
        let db = Database::new(GraphConfig::default());
        membership::register_indices(&db);
        let (reader, root, other_root, tags) = db
            .tx(|tx| {
                let user = Element::create(tx, ElementKind::User, None)?;
                let root = CollectionRoot::create_root(tx, RootKind::Tags)?;
                let other_root = CollectionRoot::create_root(tx, RootKind::Tags)?;
                let mut tags = Vec::new();
                for i in 0..n {
                    let tag = Element::create(tx, ElementKind::Tag, None)?;
                    tag.set_name(tx, &format!("tag-{i}"))?;
                    root.add_member(tx, &tag)?;
                    tags.push(tag);
                }
                Ok::<_, StoreError>((Principal::new(user.id(), "reader"), root, other_root, tags))
            })
            .unwrap();
        Fixture {
            db,
            reader,
            root,
            other_root,
            tags,
        }
    }

    #[test]
    fn find_by_uuid_is_scoped_to_root() {
        let f = fixture(2);
        let tx = f.db.begin();
        let tag = f.tags[0];
        assert_eq!(f.root.find_by_uuid(&tx, tag.id()).unwrap(), Some(tag));
        assert_eq!(f.other_root.find_by_uuid(&tx, tag.id()).unwrap(), None);
        assert_eq!(f.root.find_by_uuid(&tx, ElementId::new()).unwrap(), None);
        // The root itself exists globally but is not its own member.
        assert_eq!(f.root.find_by_uuid(&tx, f.other_root.id()).unwrap(), None);
    }

    #[test]
    fn add_member_is_idempotent() {
        let f = fixture(1);
        let mut tx = f.db.begin();
        let tag = f.tags[0];
        assert!(!f.root.add_member(&mut tx, &tag).unwrap());
        assert_eq!(
            tx.edges_between(f.root.element().vertex(), tag.vertex(), labels::HAS_TAG)
                .len(),
            1
        );

        assert!(f.other_root.add_member(&mut tx, &tag).unwrap());
        assert!(f.other_root.contains(&tx, &tag).unwrap());

        assert!(f.root.remove_member(&mut tx, &tag).unwrap());
        assert!(!f.root.remove_member(&mut tx, &tag).unwrap());
        assert!(!f.root.contains(&tx, &tag).unwrap());
        assert!(f.other_root.contains(&tx, &tag).unwrap());
    }

    #[test]
    fn not_found_precedes_forbidden() {
        let f = fixture(1);
        let tx = f.db.begin();
        let ac = ActionContext::new(&f.reader, &GraphPermissions);

        let err = f
            .root
            .load_by_uuid(&tx, &ac, ElementId::new(), Permission::Read)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = f
            .root
            .load_by_uuid(&tx, &ac, f.tags[0].id(), Permission::Read)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let err = f
            .root
            .load_by_name(&tx, &ac, "missing", Permission::Read)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = f
            .root
            .load_by_name(&tx, &ac, "tag-0", Permission::Read)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[test]
    fn list_visible_filters_and_pages() {
        let f = fixture(5);
        let mut tx = f.db.begin();
        let ac = ActionContext::new(&f.reader, &GraphPermissions);
        for tag in [f.tags[0], f.tags[2], f.tags[4]] {
            GraphPermissions
                .grant_permission(&mut tx, &f.reader, &tag, Permission::Read)
                .unwrap();
        }

        let page = f
            .root
            .list_visible(&tx, &ac, &PagingParameters::new(1, 2), Some(Permission::Read))
            .unwrap();
        assert_eq!(page.items, vec![f.tags[0], f.tags[2]]);
        assert_eq!(page.total_count, 3);
        assert_eq!(page.page_count, 2);

        let page = f
            .root
            .list_visible(&tx, &ac, &PagingParameters::new(2, 2), Some(Permission::Read))
            .unwrap();
        assert_eq!(page.items, vec![f.tags[4]]);

        let all = f
            .root
            .list_visible(&tx, &ac, &PagingParameters::new(1, 25), None)
            .unwrap();
        assert_eq!(all.total_count, 5);
        assert_eq!(all.items, f.tags);
    }

    #[test]
    fn resolve_path_segments() {
        let f = fixture(1);
        let tx = f.db.begin();
        let admin = Principal::admin(ElementId::new(), "admin");
        let ac = ActionContext::new(&admin, &GraphPermissions);

        assert_eq!(
            f.root.resolve_path(&tx, &ac, &[]).unwrap(),
            PathTarget::Root(f.root)
        );
        let id = f.tags[0].id().to_string();
        assert_eq!(
            f.root.resolve_path(&tx, &ac, &[id.as_str()]).unwrap(),
            PathTarget::Element(f.tags[0])
        );

        let err = f
            .root
            .resolve_path(&tx, &ac, &[id.as_str(), "children"])
            .unwrap_err();
        let message = err.message().unwrap();
        assert_eq!(message.key, "error_path_segment_unresolvable");
        assert_eq!(message.params, vec!["children".to_string()]);

        let err = f.root.resolve_path(&tx, &ac, &["nope"]).unwrap_err();
        assert_eq!(err.message().unwrap().key, "error_invalid_uuid");
    }

    #[test]
    fn create_rejects_mismatched_request() {
        let f = fixture(0);
        let mut tx = f.db.begin();
        let admin = Principal::admin(ElementId::new(), "admin");
        let ac = ActionContext::new(&admin, &GraphPermissions);
        let request = CreateRequest::Project(arbor_core::models::ProjectCreateRequest {
            name: "alpha".to_string(),
        });
        let err = f
            .root
            .create(&mut tx, &ac, &request, None, &mut SearchQueueBatch::new())
            .unwrap_err();
        assert_eq!(err.message().unwrap().key, "error_request_kind_mismatch");
        assert_eq!(
            err.message().unwrap().params,
            vec!["Project".to_string(), "Tag".to_string()]
        );
    }
}
