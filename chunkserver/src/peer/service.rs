use std::time::Duration;

use futures::future::join_all;
use tokio::{io::AsyncWriteExt, time::timeout};
use utilities::{
    error::GfsError,
    logger::{error, instrument, trace, tracing, warn},
    message::{ChunkRequest, WRITE_SUCCESS, WriteRole, read_response, write_message},
    replica_directory::ChunkServerRecord,
    tcp_connector::TcpConnector,
};

// acks are a couple of words, anything longer is not an ack
const MAX_ACK_BYTES: usize = 1024;

/// Outbound side of replication: forwards writes and rollbacks to the other
/// replicas of a file.
#[derive(Clone, Copy, Debug)]
pub struct PeerService {
    connector: TcpConnector,
    replication_timeout: Duration,
}

impl PeerService {
    pub fn new(connector: TcpConnector, replication_timeout: Duration) -> Self {
        Self {
            connector,
            replication_timeout,
        }
    }

    async fn exchange(
        &self,
        peer: &ChunkServerRecord,
        request: &ChunkRequest,
    ) -> Result<Vec<u8>, GfsError> {
        let mut stream = self.connector.get_connection(&peer.address()).await?;
        write_message(&mut stream, request).await?;
        stream
            .shutdown()
            .await
            .map_err(|e| GfsError::Connection(e.to_string()))?;
        read_response(&mut stream, MAX_ACK_BYTES).await
    }

    /// Sends the write to one secondary and waits for its ack.
    #[instrument(name = "peer_forward_write", skip(self, peer, data), fields(peer_id = %peer.id))]
    pub async fn forward_write(
        &self,
        peer: &ChunkServerRecord,
        file_name: &str,
        data: &str,
        write_id: &str,
    ) -> Result<(), GfsError> {
        let request = ChunkRequest::Write {
            file_name: file_name.to_owned(),
            data: data.to_owned(),
            role: WriteRole::Secondary,
            write_id: Some(write_id.to_owned()),
        };
        let response = match timeout(self.replication_timeout, self.exchange(peer, &request)).await
        {
            Ok(response) => response?,
            Err(_) => {
                return Err(GfsError::Replication(format!(
                    "{} did not ack within {:?}",
                    peer.id, self.replication_timeout
                )));
            }
        };
        let ack = String::from_utf8_lossy(&response);
        if ack.trim() == WRITE_SUCCESS {
            trace!("secondary acked");
            Ok(())
        } else {
            Err(GfsError::Replication(format!(
                "{} answered {:?}",
                peer.id,
                ack.trim()
            )))
        }
    }

    /// Forwards the write to every peer at once and returns the peers that
    /// failed to ack.
    pub async fn forward_write_to_all(
        &self,
        peers: &[ChunkServerRecord],
        file_name: &str,
        data: &str,
        write_id: &str,
    ) -> Vec<(String, GfsError)> {
        let forwards = peers.iter().map(|peer| async move {
            let result = self.forward_write(peer, file_name, data, write_id).await;
            (peer.id.clone(), result)
        });
        join_all(forwards)
            .await
            .into_iter()
            .filter_map(|(peer_id, result)| result.err().map(|e| (peer_id, e)))
            .collect()
    }

    /// Tells one peer to undo the write. Returns once the peer closed the
    /// connection, which it does after applying the rollback.
    #[instrument(name = "peer_send_rollback", skip(self, peer), fields(peer_id = %peer.id))]
    pub async fn send_rollback(
        &self,
        peer: &ChunkServerRecord,
        file_name: &str,
        write_id: &str,
    ) -> Result<(), GfsError> {
        let request = ChunkRequest::Rollback {
            file_name: file_name.to_owned(),
            write_id: Some(write_id.to_owned()),
        };
        match timeout(self.replication_timeout, self.exchange(peer, &request)).await {
            Ok(response) => response.map(|_| ()),
            Err(_) => Err(GfsError::Replication(format!(
                "{} did not finish the rollback within {:?}",
                peer.id, self.replication_timeout
            ))),
        }
    }

    /// Best effort: failures are logged and never retried.
    pub async fn rollback_all(&self, peers: &[ChunkServerRecord], file_name: &str, write_id: &str) {
        let rollbacks = peers.iter().map(|peer| async move {
            if let Err(e) = self.send_rollback(peer, file_name, write_id).await {
                error!(peer_id = %peer.id, error = %e, "rollback could not be delivered");
            }
        });
        join_all(rollbacks).await;
        warn!(%file_name, %write_id, peers = peers.len(), "rollback sent to secondaries");
    }
}
