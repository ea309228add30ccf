//! Schema containers and their version chains.
//!
//! A container owns versions numbered 1, 2, 3, ... Each version stores the
//! full [`SchemaDefinition`] it was created from and is never modified
//! afterwards; a new definition becomes a new version and moves the
//! container's latest-version pointer.

use arbor_core::{
    ElementId, ElementKind, ErrorMessage, Permission, SchemaDefinition, SchemaReference,
    SearchQueueBatch,
};
use arbor_graph::Transaction;

use crate::element::Element;
use crate::error::{Result, StoreError};
use crate::labels;
use crate::permissions::ActionContext;
use crate::project::Project;
use crate::root::{CollectionRoot, RootKind};
use crate::store::Store;

const VERSION: &str = "version";
const DEFINITION: &str = "json";
const INDEX: &str = "schema";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaContainer {
    element: Element,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaVersion {
    element: Element,
}

impl SchemaContainer {
    pub fn from_element(element: Element) -> Option<SchemaContainer> {
        (element.kind() == ElementKind::SchemaContainer).then_some(SchemaContainer { element })
    }

    pub fn element(&self) -> Element {
        self.element
    }

    pub fn id(&self) -> ElementId {
        self.element.id()
    }

    /// Validate `definition`, create the container with version 1 and add
    /// it to `root`. Validation failures are BadRequest, a taken name is
    /// Conflict; neither leaves anything behind.
    ///
    /// A container created under a project's schema root also becomes a
    /// member of the global schema root, and its name must be free there.
    pub fn create(
        tx: &mut Transaction,
        ac: &ActionContext<'_>,
        root: &CollectionRoot,
        definition: &SchemaDefinition,
        explicit_id: Option<ElementId>,
        batch: &mut SearchQueueBatch,
    ) -> Result<SchemaContainer> {
        definition.validate().map_err(StoreError::BadRequest)?;
        ac.require(tx, &root.element(), Permission::Create)?;
        root.check_name_free(tx, &definition.name, "schema_conflicting_name")?;
        let global = match Project::owning(tx, root)? {
            Some(_) => Some(Store::top_root(tx, RootKind::Schemas)?),
            None => None,
        };
        if let Some(global) = &global {
            global.check_name_free(tx, &definition.name, "schema_conflicting_name")?;
        }

        let element = Element::create(tx, ElementKind::SchemaContainer, explicit_id)?;
        element.set_name(tx, &definition.name)?;
        let container = SchemaContainer { element };

        let version = SchemaVersion::create(tx, 1, definition)?;
        container.link_latest(tx, &version)?;

        let creator = ac.user(tx);
        element.stamp_created(tx, creator.as_ref())?;
        root.add_member(tx, &element)?;
        if let Some(global) = &global {
            global.add_member(tx, &element)?;
        }
        ac.grant_crud(tx, &element)?;

        batch.create_document(INDEX, container.id(), ElementKind::SchemaContainer);
        tracing::info!(schema = %definition.name, id = %container.id(), "Schema created");
        Ok(container)
    }

    fn link_latest(&self, tx: &mut Transaction, version: &SchemaVersion) -> Result<()> {
        self.element
            .set_unique_link_out_to(tx, &version.element, &[labels::HAS_VERSION])?;
        self.element
            .set_single_link_out_to(tx, &version.element, &[labels::HAS_LATEST_VERSION])?;
        version
            .element
            .set_single_link_out_to(tx, &self.element, &[labels::HAS_PARENT_CONTAINER])
    }

    pub fn latest_version(&self, tx: &Transaction) -> Result<SchemaVersion> {
        self.element
            .out_one(tx, labels::HAS_LATEST_VERSION)?
            .map(|element| SchemaVersion { element })
            .ok_or_else(|| StoreError::corrupted(self.id(), labels::HAS_LATEST_VERSION))
    }

    /// All versions, oldest first.
    pub fn versions(&self, tx: &Transaction) -> Result<Vec<SchemaVersion>> {
        let mut versions = self
            .element
            .out_elements(tx, labels::HAS_VERSION)?
            .into_iter()
            .map(|element| {
                let version = SchemaVersion { element };
                version.revision(tx).map(|rev| (rev, version))
            })
            .collect::<Result<Vec<_>>>()?;
        versions.sort_by_key(|(rev, _)| *rev);
        Ok(versions.into_iter().map(|(_, v)| v).collect())
    }

    pub fn find_version_by_rev(
        &self,
        tx: &Transaction,
        revision: u32,
    ) -> Result<Option<SchemaVersion>> {
        for element in self.element.out_elements(tx, labels::HAS_VERSION)? {
            let version = SchemaVersion { element };
            if version.revision(tx)? == revision {
                return Ok(Some(version));
            }
        }
        Ok(None)
    }

    /// Add a new version holding `definition` and make it the latest.
    /// Requires update permission on the container; the name can't change.
    pub fn append_version(
        &self,
        tx: &mut Transaction,
        ac: &ActionContext<'_>,
        definition: &SchemaDefinition,
        batch: &mut SearchQueueBatch,
    ) -> Result<SchemaVersion> {
        definition.validate().map_err(StoreError::BadRequest)?;
        ac.require(tx, &self.element, Permission::Update)?;

        let name = self.element.name(tx)?.unwrap_or_default();
        if definition.name != name {
            return Err(StoreError::BadRequest(ErrorMessage::new(
                "schema_error_name_immutable",
                [name.as_str(), definition.name.as_str()],
            )));
        }

        let latest = self.latest_version(tx)?;
        let revision = latest.revision(tx)? + 1;
        let next = SchemaVersion::create(tx, revision, definition)?;
        latest
            .element
            .set_single_link_out_to(tx, &next.element, &[labels::HAS_NEXT_VERSION])?;
        self.link_latest(tx, &next)?;
        if let Some(user) = ac.user(tx) {
            self.element.set_editor(tx, &user)?;
        }

        batch.update_document(INDEX, self.id(), ElementKind::SchemaContainer);
        tracing::info!(schema = %name, revision, "Schema version appended");
        Ok(next)
    }

    /// Whether any node still uses this schema.
    pub fn is_in_use(&self, tx: &Transaction) -> bool {
        tx.in_edges(self.element.vertex(), labels::HAS_SCHEMA_CONTAINER)
            .next()
            .is_some()
    }

    /// Resolve a reference against the containers of `root`.
    ///
    /// A name takes precedence over a uuid. Without a revision the latest
    /// version is returned. Every failure echoes the reference, with `-` for
    /// fields it does not carry.
    pub fn resolve_reference(
        tx: &Transaction,
        root: &CollectionRoot,
        reference: &SchemaReference,
    ) -> Result<SchemaVersion> {
        let not_found = || {
            StoreError::BadRequest(ErrorMessage::new(
                "error_schema_reference_not_found",
                [
                    reference.name.clone().unwrap_or_else(|| "-".to_string()),
                    reference
                        .uuid
                        .map_or_else(|| "-".to_string(), |id| id.to_string()),
                    reference
                        .version
                        .map_or_else(|| "-".to_string(), |v| v.to_string()),
                ],
            ))
        };

        let found = match (&reference.name, reference.uuid) {
            (Some(name), _) => root.find_by_name(tx, name)?,
            (None, Some(id)) => root.find_by_uuid(tx, id)?,
            (None, None) => None,
        };
        let container = found
            .and_then(SchemaContainer::from_element)
            .ok_or_else(not_found)?;

        match reference.version {
            None => container.latest_version(tx),
            Some(revision) => container
                .find_version_by_rev(tx, revision)?
                .ok_or_else(not_found),
        }
    }
}

impl SchemaVersion {
    pub fn from_element(element: Element) -> Option<SchemaVersion> {
        (element.kind() == ElementKind::SchemaVersion).then_some(SchemaVersion { element })
    }

    pub(crate) fn create(
        tx: &mut Transaction,
        revision: u32,
        definition: &SchemaDefinition,
    ) -> Result<SchemaVersion> {
        let element = Element::create(tx, ElementKind::SchemaVersion, None)?;
        element.set_property(tx, VERSION, revision)?;
        element.set_name(tx, &definition.name)?;
        element.set_property(tx, DEFINITION, serde_json::to_value(definition)?)?;
        Ok(SchemaVersion { element })
    }

    pub fn element(&self) -> Element {
        self.element
    }

    pub fn id(&self) -> ElementId {
        self.element.id()
    }

    pub fn revision(&self, tx: &Transaction) -> Result<u32> {
        self.element
            .property(tx, VERSION)?
            .and_then(|v| v.as_u64())
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| StoreError::corrupted(self.id(), VERSION))
    }

    pub fn name(&self, tx: &Transaction) -> Result<Option<String>> {
        self.element.name(tx)
    }

    pub fn definition(&self, tx: &Transaction) -> Result<SchemaDefinition> {
        let value = self
            .element
            .property(tx, DEFINITION)?
            .ok_or_else(|| StoreError::corrupted(self.id(), DEFINITION))?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn container(&self, tx: &Transaction) -> Result<SchemaContainer> {
        self.element
            .out_one(tx, labels::HAS_PARENT_CONTAINER)?
            .and_then(SchemaContainer::from_element)
            .ok_or_else(|| StoreError::corrupted(self.id(), labels::HAS_PARENT_CONTAINER))
    }

    pub fn next_version(&self, tx: &Transaction) -> Result<Option<SchemaVersion>> {
        Ok(self
            .element
            .out_one(tx, labels::HAS_NEXT_VERSION)?
            .map(|element| SchemaVersion { element }))
    }

    pub fn previous_version(&self, tx: &Transaction) -> Result<Option<SchemaVersion>> {
        Ok(self
            .element
            .in_one(tx, labels::HAS_NEXT_VERSION)?
            .map(|element| SchemaVersion { element }))
    }
}

/// Delete a container and its versions. Fails while nodes use it.
pub(crate) fn delete(
    tx: &mut Transaction,
    element: Element,
    batch: &mut SearchQueueBatch,
) -> Result<()> {
    let container = SchemaContainer { element };
    let name = element.name(tx)?.unwrap_or_default();
    if container.is_in_use(tx) {
        return Err(StoreError::BadRequest(ErrorMessage::new(
            "schema_delete_still_in_use",
            [name],
        )));
    }
    for version in container.versions(tx)? {
        version.element.remove(tx)?;
    }
    batch.delete_document(INDEX, container.id());
    element.remove(tx)?;
    tracing::info!(schema = %name, "Schema deleted");
    Ok(())
}
