//! Arbor Graph: transactional property graph for the object store.
//!
//! This crate is the single mutation point for persisted graph state.
//! Every read and write runs inside a [`Transaction`] handle obtained from a
//! [`Database`]; uniqueness of element identities and consistency of the
//! composite edge indices are maintained here.

pub mod client;
pub mod mutations;
pub mod queries;
pub mod state;
pub mod transaction;

pub use client::{Database, GraphConfig, GraphError};
pub use state::{EdgeId, EdgeRecord, VertexId, VertexRecord};
pub use transaction::Transaction;
