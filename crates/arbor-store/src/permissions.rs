//! Permission collaborator.
//!
//! The store only asks one question ("does this principal hold permission P
//! on element E?") and applies grants to elements it creates. Everything
//! else about policy lives behind [`PermissionPolicy`].

use arbor_core::{ElementKind, Permission, Principal};
use arbor_graph::Transaction;

use crate::element::Element;
use crate::error::{Result, StoreError};
use crate::membership;

pub trait PermissionPolicy: Send + Sync {
    fn has_permission(
        &self,
        tx: &Transaction,
        principal: &Principal,
        element: &Element,
        permission: Permission,
    ) -> Result<bool>;

    fn grant_permission(
        &self,
        tx: &mut Transaction,
        principal: &Principal,
        element: &Element,
        permission: Permission,
    ) -> Result<()>;

    fn revoke_permission(
        &self,
        tx: &mut Transaction,
        principal: &Principal,
        element: &Element,
        permission: Permission,
    ) -> Result<()>;
}

/// Grants stored as `HAS_<PERM>_PERMISSION` edges from the user element to
/// the granted element. Administrators pass every check.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphPermissions;

impl GraphPermissions {
    fn user(tx: &Transaction, principal: &Principal) -> Option<Element> {
        Element::find_of_kind(tx, ElementKind::User, principal.id)
    }
}

impl PermissionPolicy for GraphPermissions {
    fn has_permission(
        &self,
        tx: &Transaction,
        principal: &Principal,
        element: &Element,
        permission: Permission,
    ) -> Result<bool> {
        if principal.admin {
            return Ok(true);
        }
        match Self::user(tx, principal) {
            Some(user) => membership::is_member(tx, &user, element, permission.edge_label()),
            None => Ok(false),
        }
    }

    fn grant_permission(
        &self,
        tx: &mut Transaction,
        principal: &Principal,
        element: &Element,
        permission: Permission,
    ) -> Result<()> {
        let user =
            Self::user(tx, principal).ok_or_else(|| StoreError::not_found(principal.id))?;
        user.set_unique_link_out_to(tx, element, &[permission.edge_label()])
    }

    fn revoke_permission(
        &self,
        tx: &mut Transaction,
        principal: &Principal,
        element: &Element,
        permission: Permission,
    ) -> Result<()> {
        if let Some(user) = Self::user(tx, principal) {
            user.unlink_out(tx, Some(element), &[permission.edge_label()])?;
        }
        Ok(())
    }
}

/// The acting principal plus the policy it is judged by, threaded through
/// every operation that checks or grants permissions.
#[derive(Clone, Copy)]
pub struct ActionContext<'a> {
    pub principal: &'a Principal,
    pub permissions: &'a dyn PermissionPolicy,
}

impl<'a> ActionContext<'a> {
    pub fn new(principal: &'a Principal, permissions: &'a dyn PermissionPolicy) -> Self {
        Self {
            principal,
            permissions,
        }
    }

    pub fn has_permission(
        &self,
        tx: &Transaction,
        element: &Element,
        permission: Permission,
    ) -> Result<bool> {
        self.permissions
            .has_permission(tx, self.principal, element, permission)
    }

    /// Fail with Forbidden unless the principal holds `permission`.
    pub fn require(&self, tx: &Transaction, element: &Element, permission: Permission) -> Result<()> {
        if self.has_permission(tx, element, permission)? {
            Ok(())
        } else {
            tracing::debug!(
                principal = %self.principal.name,
                element = %element.id(),
                %permission,
                "Permission denied"
            );
            Err(StoreError::forbidden(element.id()))
        }
    }

    /// Grant create, read, update and delete on `element` to the principal.
    pub fn grant_crud(&self, tx: &mut Transaction, element: &Element) -> Result<()> {
        for permission in Permission::ALL {
            self.permissions
                .grant_permission(tx, self.principal, element, permission)?;
        }
        Ok(())
    }

    /// The user element of the principal, if it is persisted.
    pub fn user(&self, tx: &Transaction) -> Option<Element> {
        Element::find_of_kind(tx, ElementKind::User, self.principal.id)
    }
}

impl std::fmt::Debug for ActionContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionContext")
            .field("principal", &self.principal)
            .finish()
    }
}
