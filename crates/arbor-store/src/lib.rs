//! Arbor Store: permission-aware object store on a property graph.
//!
//! Persisted state is a graph of [`Element`]s. Homogeneous sets of elements
//! hang off [`CollectionRoot`]s through one membership edge label each;
//! membership is answered through a composite edge index instead of scanning
//! the root's out-edges. Projects provision their own sub-roots when created,
//! schema containers own an append-only chain of immutable versions.
//!
//! Every operation takes an explicit graph [`Transaction`] handle; the
//! [`Store`] facade wraps the multi-step workflows in one transaction each and
//! runs post-commit side effects with compensation.
//!
//! [`Transaction`]: arbor_graph::Transaction

pub mod element;
pub mod error;
pub mod labels;
pub mod membership;
pub mod node;
pub mod permissions;
pub mod project;
pub mod root;
pub mod router;
pub mod schema;
pub mod search;
pub mod store;
pub mod tag;
pub mod user;

pub use element::{Element, ElementView};
pub use error::{Result, StoreError};
pub use permissions::{ActionContext, GraphPermissions, PermissionPolicy};
pub use project::Project;
pub use root::{CollectionRoot, PathTarget, RootKind};
pub use router::{InMemoryRoutes, RouteRegistry};
pub use schema::{SchemaContainer, SchemaVersion};
pub use search::{DispatchStats, LoggingIndex, RecordingIndex, SearchIndexHandler, SearchQueue};
pub use store::{Created, ResolvedSchema, Store};
