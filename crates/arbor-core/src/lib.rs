//! arbor-core: Shared types, configuration, and error handling for the Arbor object store.
//!
//! This crate provides the foundational types used across all Arbor components:
//! - Element identities and the closed set of element kinds
//! - Permissions, principals and paging
//! - Schema definitions and create requests
//! - Search index operations emitted by store workflows
//! - Error kinds with the templated message catalog
//! - Configuration management

pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod types;

pub use config::StoreConfig;
pub use error::{ErrorKind, ErrorMessage};
pub use events::{IndexOperation, SearchQueueBatch};
pub use models::{CreateRequest, FieldSchema, FieldType, SchemaDefinition, SchemaReference};
pub use types::{ElementId, ElementKind, Page, PagingParameters, Permission, Principal};
