use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use switchboard_core::domain::authorization::{AuthorizationRecord, TeamId};
use switchboard_core::errors::{ApplicationError, DomainError};

pub mod authorization;
pub mod memory;

pub use authorization::SqlAuthorizationStore;
pub use memory::InMemoryAuthorizationStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("invalid table name `{0}`")]
    InvalidTable(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Domain(error) => Self::Domain(error),
            other => Self::Persistence(other.to_string()),
        }
    }
}

/// Per-team authorization records, keyed by team identifier.
#[async_trait]
pub trait AuthorizationStore: Send + Sync {
    async fn get(&self, id: &TeamId) -> Result<Option<AuthorizationRecord>, RepositoryError>;

    /// Persists an OAuth document, deriving its key from `id`, `team_id` or
    /// `team.id` in that order. Saving an existing key overwrites it.
    async fn save(&self, document: Value) -> Result<AuthorizationRecord, RepositoryError>;
}
