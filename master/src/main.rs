use std::{path::Path, sync::Arc};

use master::{
    client_handler::ClientHandler, config::CONFIG, health_monitor::HealthMonitor,
    master_state::MasterState, tcp::service::TCPService,
};
use utilities::{
    logger::{error, info, init_logger},
    replica_directory::ReplicaDirectory,
    result::Result,
    tcp_connector::TcpConnector,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = match CONFIG.as_ref() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return Err(e.clone().into());
        }
    };
    let _gaurd = init_logger("Master", &config.id, &config.log_level, &config.log_base);
    info!(files = %config.files_metadata_path, servers = %config.servers_path, "Loading the replica directory");
    let directory = match ReplicaDirectory::load(
        Path::new(&config.files_metadata_path),
        Path::new(&config.servers_path),
    ) {
        Ok(directory) => Arc::new(directory),
        Err(e) => {
            error!(error = %e, "Error while loading metadata Hence shuting down");
            return Err(e.into());
        }
    };
    let state = MasterState::new(directory.clone());

    HealthMonitor::new(
        directory,
        state.health.clone(),
        TcpConnector::new(config.probe_timeout()),
        config.health_check_interval(),
    )
    .start();

    let service = match TCPService::bind(
        &config.listen_addrs,
        Arc::new(ClientHandler::new(state)),
        config.request_timeout(),
        config.max_request_bytes,
    )
    .await
    {
        Ok(service) => service,
        Err(e) => {
            error!(addrs = %config.listen_addrs, error = %e, "Error while binding Hence shuting down");
            return Err(e);
        }
    };
    info!(addrs = %config.listen_addrs, "Master listening");
    service.start_and_accept().await
}
