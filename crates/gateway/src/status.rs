use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// One client status-check record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusCheck {
    pub id: String,
    pub client_name: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct StatusCheckCreate {
    pub client_name: String,
}

/// In-memory status-check store. The real document store is an
/// out-of-scope collaborator; this keeps the same create/list surface.
#[derive(Clone, Default)]
pub struct StatusStore {
    records: Arc<RwLock<Vec<StatusCheck>>>,
}

impl StatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, client_name: String) -> StatusCheck {
        let record = StatusCheck {
            id: Uuid::new_v4().to_string(),
            client_name,
            timestamp: Utc::now(),
        };
        self.records.write().await.push(record.clone());
        record
    }

    pub async fn list(&self) -> Vec<StatusCheck> {
        self.records.read().await.clone()
    }
}
