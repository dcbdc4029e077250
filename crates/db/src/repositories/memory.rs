use std::collections::HashMap;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;

use switchboard_core::domain::authorization::{AuthorizationRecord, TeamId};

use super::{AuthorizationStore, RepositoryError};

#[derive(Default)]
pub struct InMemoryAuthorizationStore {
    records: RwLock<HashMap<String, AuthorizationRecord>>,
}

impl InMemoryAuthorizationStore {
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl AuthorizationStore for InMemoryAuthorizationStore {
    async fn get(&self, id: &TeamId) -> Result<Option<AuthorizationRecord>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.get(&id.0).cloned())
    }

    async fn save(&self, document: Value) -> Result<AuthorizationRecord, RepositoryError> {
        let record = AuthorizationRecord::from_document(document, Utc::now())?;
        let mut records = self.records.write().await;
        records.insert(record.id.0.clone(), record.clone());
        Ok(record)
    }
}
