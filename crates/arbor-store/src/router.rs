//! Routing collaborator: makes projects reachable by name.
//!
//! Registration happens outside the storage transaction, so the store
//! compensates a failed registration itself.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use arbor_core::ElementId;

pub trait RouteRegistry: Send + Sync {
    fn register_project(&self, name: &str, id: ElementId) -> anyhow::Result<()>;
    fn unregister_project(&self, name: &str) -> anyhow::Result<()>;
}

/// Route table held in memory.
#[derive(Debug, Default)]
pub struct InMemoryRoutes {
    routes: RwLock<BTreeMap<String, ElementId>>,
    fail_next: AtomicBool,
}

impl InMemoryRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next registration or unregistration fail.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn routes(&self) -> BTreeMap<String, ElementId> {
        match self.routes.read() {
            Ok(routes) => routes.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.routes().contains_key(name)
    }

    fn check_failure(&self) -> anyhow::Result<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            anyhow::bail!("route registry unavailable");
        }
        Ok(())
    }
}

impl RouteRegistry for InMemoryRoutes {
    fn register_project(&self, name: &str, id: ElementId) -> anyhow::Result<()> {
        self.check_failure()?;
        let mut routes = self
            .routes
            .write()
            .map_err(|_| anyhow::anyhow!("route table lock poisoned"))?;
        if let Some(existing) = routes.get(name) {
            if *existing != id {
                anyhow::bail!("route \"{name}\" is already taken by {existing}");
            }
        }
        routes.insert(name.to_string(), id);
        tracing::debug!(project = %name, %id, "Route registered");
        Ok(())
    }

    fn unregister_project(&self, name: &str) -> anyhow::Result<()> {
        self.check_failure()?;
        self.routes
            .write()
            .map_err(|_| anyhow::anyhow!("route table lock poisoned"))?
            .remove(name);
        tracing::debug!(project = %name, "Route removed");
        Ok(())
    }
}
