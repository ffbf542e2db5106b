use super::selection_policy::ChunkServerSelectionPolicy;
use crate::master_state::MasterState;
use async_trait::async_trait;
use utilities::{
    error::GfsError,
    logger::{debug, instrument, tracing, warn},
    replica_directory::ChunkServerRecord,
};

/// Reads go to the healthy replica with the fewest reads handed out so far,
/// writes always go to the primary.
#[derive(Clone, Debug)]
pub struct LeastLoadedPolicy {
    state: MasterState,
}

impl LeastLoadedPolicy {
    pub fn new(state: MasterState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl ChunkServerSelectionPolicy for LeastLoadedPolicy {
    #[instrument(name = "policy_select_for_read", skip(self))]
    async fn select_for_read(&self, file_name: &str) -> Result<ChunkServerRecord, GfsError> {
        let Some(replicas) = self.state.directory.replicas(file_name) else {
            return Err(GfsError::FileNotFound(file_name.to_owned()));
        };
        let healthy = self.state.health.healthy_among(replicas).await;
        let Some((server_id, load)) = self.state.loads.assign_least_loaded(&healthy).await else {
            warn!(%file_name, "every replica is down");
            return Err(GfsError::NoServerAvailable(file_name.to_owned()));
        };
        debug!(%file_name, %server_id, load, "read assigned");
        self.state
            .directory
            .server(&server_id)
            .cloned()
            .ok_or_else(|| GfsError::NoServerAvailable(file_name.to_owned()))
    }
    // health is not consulted, the primary is the only server that may
    // coordinate a write
    #[instrument(name = "policy_select_for_write", skip(self))]
    async fn select_for_write(&self, file_name: &str) -> Result<ChunkServerRecord, GfsError> {
        self.state
            .directory
            .primary(file_name)
            .cloned()
            .ok_or_else(|| GfsError::FileNotFound(file_name.to_owned()))
    }
}
