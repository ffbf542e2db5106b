use std::{path::Path, sync::Arc};

use chunkserver::{
    chunkserver_state::ChunkServerState,
    client::handler::ClientHandler,
    config::{CONFIG, Config},
    peer::{handler::PeerHandler, service::PeerService},
    tcp::service::TCPService,
};
use futures::future::join_all;
use storage::file_storage::FileStorage;
use tokio::net::TcpListener;
use utilities::{
    logger::{Instrument, Level, error, info, init_logger, span},
    replica_directory::ReplicaDirectory,
    result::Result,
    tcp_connector::TcpConnector,
};

async fn build_service(
    config: &Config,
    server_id: &str,
    directory: Arc<ReplicaDirectory>,
) -> Result<TCPService> {
    let Some(record) = directory.server(server_id) else {
        return Err(format!("chunk server {server_id} is not in the server registry").into());
    };
    let listener = TcpListener::bind(record.address()).await?;
    let store = FileStorage::new(config.storage_dir(server_id)).await?;
    let state = ChunkServerState::new(server_id, directory.clone(), store);
    let peer_service = PeerService::new(
        TcpConnector::new(config.replication_timeout()),
        config.replication_timeout(),
    );
    info!(%server_id, addrs = %record.address(), "Chunk server listening");
    Ok(TCPService::new(
        listener,
        Arc::new(ClientHandler::new(state.clone(), peer_service)),
        Arc::new(PeerHandler::new(state)),
        config.request_timeout(),
        config.max_request_bytes,
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = match CONFIG.as_ref() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return Err(e.clone().into());
        }
    };
    let _gaurd = init_logger("ChunkServer", &config.id, &config.log_level, &config.log_base);
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

    let mut accept_loops = vec![];
    for server_id in &config.server_ids {
        let service = match build_service(config, server_id, directory.clone()).await {
            Ok(service) => service,
            Err(e) => {
                error!(%server_id, error = %e, "Error while starting chunk server Hence shuting down");
                return Err(e);
            }
        };
        let span = span!(Level::INFO, "chunkserver", server_id = %server_id);
        accept_loops.push(tokio::spawn(
            async move { service.start_and_accept().await }.instrument(span),
        ));
    }
    for result in join_all(accept_loops).await {
        match result {
            Ok(Err(e)) => error!(error = %e, "accept loop stopped"),
            Err(e) => error!(error = %e, "accept loop panicked"),
            Ok(Ok(())) => {}
        }
    }
    Ok(())
}
