pub mod health_table;
pub mod load_tracker;

use std::sync::Arc;

use health_table::HealthTable;
use load_tracker::LoadTracker;
use utilities::replica_directory::ReplicaDirectory;

/// Everything the master knows at runtime. The directory is read only, the
/// two tables own their locks so callers never see the raw maps.
#[derive(Clone, Debug)]
pub struct MasterState {
    pub directory: Arc<ReplicaDirectory>,
    pub health: HealthTable,
    pub loads: LoadTracker,
}

impl MasterState {
    pub fn new(directory: Arc<ReplicaDirectory>) -> Self {
        let server_ids: Vec<String> = directory.servers().map(|s| s.id.clone()).collect();
        Self {
            health: HealthTable::new(&server_ids),
            loads: LoadTracker::new(&server_ids),
            directory,
        }
    }
}
