//! Tag families and tags of a project.

use arbor_core::models::{TagCreateRequest, TagFamilyCreateRequest};
use arbor_core::{ElementId, ElementKind, Permission, SearchQueueBatch};
use arbor_graph::Transaction;

use crate::element::Element;
use crate::error::{Result, StoreError};
use crate::labels;
use crate::permissions::ActionContext;
use crate::project::Project;
use crate::root::{self, CollectionRoot};

const TAG_FAMILY_INDEX: &str = "tag-family";
const TAG_INDEX: &str = "tag";

/// Create hook of a project's tag family root.
pub(crate) fn create_tag_family(
    tx: &mut Transaction,
    ac: &ActionContext<'_>,
    root: &CollectionRoot,
    request: &TagFamilyCreateRequest,
    explicit_id: Option<ElementId>,
    batch: &mut SearchQueueBatch,
) -> Result<Element> {
    root::require_name(&request.name, "tagfamily_missing_name")?;
    ac.require(tx, &root.element(), Permission::Create)?;
    root.check_name_free(tx, &request.name, "tagfamily_conflicting_name")?;

    let family = Element::create(tx, ElementKind::TagFamily, explicit_id)?;
    family.set_name(tx, &request.name)?;
    Project::adopt(tx, root, &family)?;
    let creator = ac.user(tx);
    family.stamp_created(tx, creator.as_ref())?;
    root.add_member(tx, &family)?;
    ac.grant_crud(tx, &family)?;

    batch.create_document(TAG_FAMILY_INDEX, family.id(), ElementKind::TagFamily);
    tracing::info!(tag_family = %request.name, id = %family.id(), "Tag family created");
    Ok(family)
}

/// Create hook of a project's tag root. The tag family must belong to the
/// same project.
pub(crate) fn create_tag(
    tx: &mut Transaction,
    ac: &ActionContext<'_>,
    root: &CollectionRoot,
    request: &TagCreateRequest,
    explicit_id: Option<ElementId>,
    batch: &mut SearchQueueBatch,
) -> Result<Element> {
    root::require_name(&request.name, "tag_missing_name")?;
    ac.require(tx, &root.element(), Permission::Create)?;

    let family = match Project::owning(tx, root)? {
        Some(project) => project
            .tag_family_root(tx)?
            .find_by_uuid(tx, request.tag_family)?,
        None => None,
    }
    .ok_or_else(|| StoreError::not_found(request.tag_family))?;
    root.check_name_free(tx, &request.name, "tag_conflicting_name")?;

    let tag = Element::create(tx, ElementKind::Tag, explicit_id)?;
    tag.set_name(tx, &request.name)?;
    tag.set_single_link_out_to(tx, &family, &[labels::HAS_PARENT_TAG_FAMILY])?;
    Project::adopt(tx, root, &tag)?;
    let creator = ac.user(tx);
    tag.stamp_created(tx, creator.as_ref())?;
    root.add_member(tx, &tag)?;
    ac.grant_crud(tx, &tag)?;

    batch.create_document(TAG_INDEX, tag.id(), ElementKind::Tag);
    tracing::info!(tag = %request.name, id = %tag.id(), "Tag created");
    Ok(tag)
}

/// Tags belonging to a tag family.
pub fn tags_of_family(tx: &Transaction, family: &Element) -> Result<Vec<Element>> {
    family.in_elements(tx, labels::HAS_PARENT_TAG_FAMILY)
}

pub fn family_of(tx: &Transaction, tag: &Element) -> Result<Option<Element>> {
    tag.out_one(tx, labels::HAS_PARENT_TAG_FAMILY)
}

/// Delete a tag family together with its tags.
pub(crate) fn delete_tag_family(
    tx: &mut Transaction,
    family: Element,
    batch: &mut SearchQueueBatch,
) -> Result<()> {
    for tag in tags_of_family(tx, &family)? {
        delete_tag(tx, tag, batch)?;
    }
    batch.delete_document(TAG_FAMILY_INDEX, family.id());
    family.remove(tx)
}

pub(crate) fn delete_tag(
    tx: &mut Transaction,
    tag: Element,
    batch: &mut SearchQueueBatch,
) -> Result<()> {
    batch.delete_document(TAG_INDEX, tag.id());
    tag.remove(tx)
}
