use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;

/// Last probe result per chunk server. Every server starts out healthy.
#[derive(Clone, Debug, Default)]
pub struct HealthTable {
    status: Arc<Mutex<HashMap<String, bool>>>,
}

impl HealthTable {
    pub fn new(server_ids: &[String]) -> Self {
        let status = server_ids.iter().map(|id| (id.clone(), true)).collect();
        Self {
            status: Arc::new(Mutex::new(status)),
        }
    }
    /// Records a probe result and returns the previous one.
    pub async fn set(&self, server_id: &str, healthy: bool) -> Option<bool> {
        self.status
            .lock()
            .await
            .insert(server_id.to_owned(), healthy)
    }
    pub async fn is_healthy(&self, server_id: &str) -> bool {
        self.status
            .lock()
            .await
            .get(server_id)
            .copied()
            .unwrap_or(false)
    }
    /// Keeps the healthy ids of `candidates`, in their original order.
    pub async fn healthy_among(&self, candidates: &[String]) -> Vec<String> {
        let status = self.status.lock().await;
        candidates
            .iter()
            .filter(|id| status.get(id.as_str()).copied().unwrap_or(false))
            .cloned()
            .collect()
    }
}
