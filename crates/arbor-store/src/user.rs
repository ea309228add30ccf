//! Users and the principals derived from them.

use arbor_core::models::UserCreateRequest;
use arbor_core::{ElementId, ElementKind, Permission, Principal, SearchQueueBatch};
use arbor_graph::Transaction;
use serde_json::Value;

use crate::element::Element;
use crate::error::{Result, StoreError};
use crate::permissions::ActionContext;
use crate::root::{self, CollectionRoot};

/// Boolean property marking administrators.
pub const ADMIN: &str = "admin";

const INDEX: &str = "user";

/// Create hook of the user root.
pub(crate) fn create(
    tx: &mut Transaction,
    ac: &ActionContext<'_>,
    root: &CollectionRoot,
    request: &UserCreateRequest,
    explicit_id: Option<ElementId>,
    batch: &mut SearchQueueBatch,
) -> Result<Element> {
    root::require_name(&request.username, "user_missing_username")?;
    ac.require(tx, &root.element(), Permission::Create)?;
    root.check_name_free(tx, &request.username, "user_conflicting_username")?;

    let creator = ac.user(tx);
    let user = provision(tx, root, &request.username, request.admin, creator.as_ref(), explicit_id)?;
    ac.grant_crud(tx, &user)?;

    batch.create_document(INDEX, user.id(), ElementKind::User);
    tracing::info!(user = %request.username, id = %user.id(), admin = request.admin, "User created");
    Ok(user)
}

/// Create the user element and add it to `root` without any checks. Used
/// at bootstrap, before any principal exists.
pub(crate) fn provision(
    tx: &mut Transaction,
    root: &CollectionRoot,
    username: &str,
    admin: bool,
    creator: Option<&Element>,
    explicit_id: Option<ElementId>,
) -> Result<Element> {
    let user = Element::create(tx, ElementKind::User, explicit_id)?;
    user.set_name(tx, username)?;
    user.set_property(tx, ADMIN, admin)?;
    user.stamp_created(tx, creator)?;
    root.add_member(tx, &user)?;
    Ok(user)
}

pub fn is_admin(tx: &Transaction, user: &Element) -> Result<bool> {
    Ok(matches!(user.property(tx, ADMIN)?, Some(Value::Bool(true))))
}

/// The principal acting as `user`.
pub fn principal_for(tx: &Transaction, user: &Element) -> Result<Principal> {
    if user.kind() != ElementKind::User {
        return Err(StoreError::not_found(user.id()));
    }
    let name = user.name(tx)?.unwrap_or_default();
    let principal = if is_admin(tx, user)? {
        Principal::admin(user.id(), name)
    } else {
        Principal::new(user.id(), name)
    };
    Ok(principal)
}

pub(crate) fn delete(
    tx: &mut Transaction,
    user: Element,
    batch: &mut SearchQueueBatch,
) -> Result<()> {
    batch.delete_document(INDEX, user.id());
    user.remove(tx)?;
    tracing::info!(id = %user.id(), "User deleted");
    Ok(())
}
