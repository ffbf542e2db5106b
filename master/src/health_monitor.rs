use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use tokio::{
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use utilities::{
    logger::{Instrument, Level, debug, info, span, warn},
    replica_directory::ReplicaDirectory,
    tcp_connector::TcpConnector,
};

use crate::master_state::health_table::HealthTable;

/// Periodically connects to every registered chunk server and records whether
/// it answered.
pub struct HealthMonitor {
    directory: Arc<ReplicaDirectory>,
    health: HealthTable,
    connector: TcpConnector,
    probe_interval: Duration,
}

impl HealthMonitor {
    pub fn new(
        directory: Arc<ReplicaDirectory>,
        health: HealthTable,
        connector: TcpConnector,
        probe_interval: Duration,
    ) -> Self {
        Self {
            directory,
            health,
            connector,
            probe_interval,
        }
    }

    /// Probes all servers concurrently and updates the health table.
    pub async fn run_probe_cycle(&self) {
        let probes = self.directory.servers().map(|server| async move {
            let result = self.connector.probe(&server.address()).await;
            (server, result)
        });
        for (server, result) in join_all(probes).await {
            let healthy = result.is_ok();
            let previous = self.health.set(&server.id, healthy).await;
            match (previous, result) {
                (Some(true), Err(e)) => {
                    warn!(server_id = %server.id, address = %server.address(), error = %e, "chunk server went down")
                }
                (Some(false), Ok(())) => {
                    info!(server_id = %server.id, address = %server.address(), "chunk server is back")
                }
                (_, result) => {
                    debug!(server_id = %server.id, healthy = result.is_ok(), "probe done")
                }
            }
        }
    }

    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.probe_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let span = span!(Level::INFO, "master_health_check");
                self.run_probe_cycle().instrument(span).await;
            }
        })
    }
}
