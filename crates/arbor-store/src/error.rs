use arbor_core::types::UnknownKind;
use arbor_core::{ElementId, ElementKind, ErrorKind, ErrorMessage};
use arbor_graph::GraphError;
use thiserror::Error;

/// Errors from store operations.
///
/// Expected conditions carry an [`ErrorMessage`]; only engine faults and
/// corrupted state surface as internal errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(ErrorMessage),

    #[error("{0}")]
    Forbidden(ErrorMessage),

    #[error("{0}")]
    BadRequest(ErrorMessage),

    #[error("{message}")]
    Conflict {
        message: ErrorMessage,
        /// The element already holding the contested name or identity.
        conflicting: Option<ElementId>,
    },

    #[error("{0}")]
    Unsupported(ErrorMessage),

    /// A side effect outside the storage transaction failed after commit.
    #[error("Side effect failed after commit: {source}")]
    SideEffect {
        #[source]
        source: anyhow::Error,
        /// Failure of the compensating storage rollback, if one was attempted and failed.
        rollback: Option<Box<StoreError>>,
    },

    #[error("Store has not been bootstrapped")]
    NotBootstrapped,

    #[error("Corrupted element: {0}")]
    UnknownKind(#[from] UnknownKind),

    #[error("Corrupted element {0}: {1}")]
    Corrupted(ElementId, String),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(id: ElementId) -> Self {
        Self::NotFound(ErrorMessage::new(
            "object_not_found_for_uuid",
            [id.to_string()],
        ))
    }

    pub fn forbidden(id: ElementId) -> Self {
        Self::Forbidden(ErrorMessage::new("error_missing_perm", [id.to_string()]))
    }

    pub(crate) fn corrupted(id: ElementId, what: &str) -> Self {
        Self::Corrupted(id, what.to_string())
    }

    pub(crate) fn unsupported_delete(kind: ElementKind) -> Self {
        Self::Unsupported(ErrorMessage::new(
            "error_delete_not_supported",
            [kind.to_string()],
        ))
    }

    pub fn conflict(message: ErrorMessage, conflicting: Option<ElementId>) -> Self {
        Self::Conflict {
            message,
            conflicting,
        }
    }

    /// Stable classification for callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::BadRequest(_) => ErrorKind::BadRequest,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::SideEffect { .. } => ErrorKind::SideEffect,
            Self::Graph(GraphError::Conflict(_) | GraphError::DuplicateUuid(_)) => {
                ErrorKind::Conflict
            }
            Self::NotBootstrapped
            | Self::UnknownKind(_)
            | Self::Corrupted(..)
            | Self::Graph(_)
            | Self::Serialization(_) => ErrorKind::Internal,
        }
    }

    /// The message key and parameters, for expected conditions.
    pub fn message(&self) -> Option<&ErrorMessage> {
        match self {
            Self::NotFound(m) | Self::Forbidden(m) | Self::BadRequest(m) | Self::Unsupported(m) => {
                Some(m)
            }
            Self::Conflict { message, .. } => Some(message),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
