//! Error types shared by the core crate.

use thiserror::Error;

/// Integrity violation raised by a registry operation.
///
/// A failed operation leaves the aggregate untouched, so callers can
/// surface the error without having to roll anything back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("pending mention not found: {0}")]
    PendingNotFound(String),

    #[error("name already in use by project '{owner}': {name}")]
    NameTaken { name: String, owner: String },

    #[error("alias '{alias}' already belongs to project '{owner}'")]
    AliasTaken { alias: String, owner: String },

    #[error("already pending review: {0}")]
    AlreadyPending(String),

    #[error("name is on the rejected list: {0}")]
    Rejected(String),

    #[error("name is not on the rejected list: {0}")]
    NotRejected(String),

    #[error("sub-item '{name}' not found in project '{project}'")]
    SubItemNotFound { project: String, name: String },

    #[error("sub-item '{name}' already exists in project '{project}'")]
    DuplicateSubItem { project: String, name: String },

    #[error("category already exists: {0}")]
    CategoryExists(String),

    #[error("category not found: {0}")]
    CategoryNotFound(String),

    #[error("name must not be empty")]
    EmptyName,
}

impl RegistryError {
    /// True for the variants that mean "the thing you referenced does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RegistryError::ProjectNotFound(_)
                | RegistryError::PendingNotFound(_)
                | RegistryError::NotRejected(_)
                | RegistryError::SubItemNotFound { .. }
                | RegistryError::CategoryNotFound(_)
        )
    }
}

/// Failure of an embedding or completion provider call.
///
/// Never fatal to a resolution: each cascade stage treats any variant as
/// "no signal" and falls through.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("provider is disabled")]
    Disabled,

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("provider call timed out")]
    Timeout,

    #[error("provider returned an empty response")]
    Empty,

    #[error("malformed provider output: {0}")]
    Malformed(String),
}
