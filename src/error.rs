use std::fmt;
use thiserror::Error;

/// Rejected before any remote call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter an item name")]
    BlankName,
    #[error("\"{0}\" already exists in your shopping list")]
    DuplicateName(String),
    #[error("Days until next purchase must be a finite number")]
    InvalidEstimate,
    #[error("List token \"{0}\" is not valid or the list does not exist")]
    InvalidToken(String),
    #[error("No list is selected")]
    NoActiveList,
    #[error("The list is still loading")]
    ListNotLoaded,
    #[error("No item with id {0} in the current list")]
    UnknownItem(String),
}

/// Failure reported by the remote document store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("remote store unavailable: {0}")]
    Unavailable(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOperation {
    Subscribe,
    Read,
    Insert,
    Update,
    Delete,
}

impl fmt::Display for RemoteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Subscribe => "subscribe",
            Self::Read => "read",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{operation} failed: {source}")]
    Remote {
        operation: RemoteOperation,
        #[source]
        source: RemoteError,
    },
}

impl SessionError {
    pub fn remote(operation: RemoteOperation) -> impl FnOnce(RemoteError) -> Self {
        move |source| Self::Remote { operation, source }
    }
}

/// Failure of the local key-value persistence layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}
