use storage::storage::Storage;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use utilities::{
    error::GfsError,
    logger::{debug, error, info, instrument, tracing, warn},
    message::{WRITE_FAILED, WRITE_SUCCESS},
    result::Result,
};
use uuid::Uuid;

use crate::{chunkserver_state::ChunkServerState, peer::service::PeerService};

const READ_BLOCK_SIZE: usize = 8192;

/// How a write coordinated by this server ended.
#[derive(Debug, PartialEq)]
pub enum WriteOutcome {
    Committed,
    /// The local append failed, nothing reached the secondaries.
    LocalFailure(GfsError),
    /// A secondary failed, the write was undone here and rollbacks were sent.
    RolledBack(GfsError),
}

impl WriteOutcome {
    pub fn response(&self) -> &'static str {
        match self {
            WriteOutcome::Committed => WRITE_SUCCESS,
            WriteOutcome::LocalFailure(_) | WriteOutcome::RolledBack(_) => WRITE_FAILED,
        }
    }
}

/// Requests coming from clients: reads, and writes this server coordinates as
/// the primary.
pub struct ClientHandler {
    state: ChunkServerState,
    peer_service: PeerService,
}

impl ClientHandler {
    pub fn new(state: ChunkServerState, peer_service: PeerService) -> Self {
        Self {
            state,
            peer_service,
        }
    }

    /// Streams the whole file to `writer`, or an error message when this
    /// server doesn't have it.
    #[instrument(name = "client_read", skip(self, writer), fields(server_id = %self.state.server_id))]
    pub async fn handle_read(
        &self,
        file_name: &str,
        writer: &mut (impl AsyncWrite + Unpin),
    ) -> Result<()> {
        if !self.state.manages(file_name) || !self.state.store.contains(file_name).await {
            warn!(%file_name, "read for a file not stored here");
            writer
                .write_all(format!("Error: File {file_name} not found on server.").as_bytes())
                .await?;
            return Ok(());
        }
        // the length is taken under the lock so a read never sees half a
        // write, the bytes are streamed after it is released
        let opened: Result<_> = async {
            let _guard = self.state.file_locks.lock(file_name).await;
            let len = self.state.store.file_size(file_name).await?;
            let reader = self.state.store.read(file_name).await?;
            Ok(reader.take(len))
        }
        .await;
        let mut sent = 0_u64;
        let streamed: Result<()> = async {
            let mut reader = opened?;
            let mut block = vec![0u8; READ_BLOCK_SIZE];
            loop {
                let n = reader.read(&mut block).await?;
                if n == 0 {
                    return Ok(());
                }
                writer.write_all(&block[..n]).await?;
                sent += n as u64;
            }
        }
        .await;
        if let Err(e) = streamed {
            error!(%file_name, sent, error = %e, "Error while reading file");
            if sent == 0 {
                writer
                    .write_all(format!("Error: Could not read file {file_name}").as_bytes())
                    .await?;
            }
            return Ok(());
        }
        debug!(%file_name, sent, "file served");
        Ok(())
    }

    /// Appends locally, replicates to every secondary and rolls everything
    /// back if any of them fails. The file lock is held until the outcome is
    /// final so writes reach secondaries in the order they were applied here.
    #[instrument(name = "client_primary_write", skip(self, data), fields(server_id = %self.state.server_id, bytes = data.len()))]
    pub async fn handle_primary_write(&self, file_name: &str, data: &str) -> WriteOutcome {
        if !self.state.manages(file_name) {
            error!(%file_name, "write for a file this server does not hold");
            return WriteOutcome::LocalFailure(GfsError::FileNotFound(file_name.to_owned()));
        }
        let _guard = self.state.file_locks.lock(file_name).await;
        let receipt = match self.state.store.append(file_name, data.as_bytes()).await {
            Ok(receipt) => receipt,
            Err(e) => {
                error!(%file_name, error = %e, "Error while appending locally");
                return WriteOutcome::LocalFailure(GfsError::LocalWrite(e.to_string()));
            }
        };
        let secondaries = self
            .state
            .directory
            .secondaries(file_name, &self.state.server_id);
        let write_id = Uuid::new_v4().to_string();
        let failures = self
            .peer_service
            .forward_write_to_all(&secondaries, file_name, data, &write_id)
            .await;
        if failures.is_empty() {
            info!(%file_name, %write_id, secondaries = secondaries.len(), "write committed");
            return WriteOutcome::Committed;
        }
        for (peer_id, e) in &failures {
            warn!(%file_name, %write_id, %peer_id, error = %e, "secondary failed the write");
        }
        if let Err(e) = self.state.store.undo(file_name, &receipt).await {
            error!(%file_name, error = %e, "Error while undoing the local append");
        }
        self.peer_service
            .rollback_all(&secondaries, file_name, &write_id)
            .await;
        let failed_peers: Vec<&str> = failures.iter().map(|(id, _)| id.as_str()).collect();
        WriteOutcome::RolledBack(GfsError::Replication(format!(
            "{} failed to ack",
            failed_peers.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::HashMap, sync::Arc, time::Duration};
    use storage::file_storage::FileStorage;
    use utilities::{
        replica_directory::{ChunkServerRecord, ReplicaDirectory},
        tcp_connector::TcpConnector,
    };

    async fn handler() -> (ClientHandler, ChunkServerState) {
        let directory = ReplicaDirectory::new(
            vec![ChunkServerRecord::new("A", "127.0.0.1", 6001)],
            HashMap::from([
                ("report.txt".to_owned(), vec!["A".to_owned()]),
                ("notes.txt".to_owned(), vec!["A".to_owned()]),
            ]),
        )
        .unwrap();
        let root =
            std::env::temp_dir().join(format!("client-handler-test-{}", uuid::Uuid::new_v4()));
        let store = FileStorage::new(root).await.unwrap();
        let state = ChunkServerState::new("A", Arc::new(directory), store);
        let peer_service = PeerService::new(
            TcpConnector::new(Duration::from_millis(500)),
            Duration::from_secs(1),
        );
        (ClientHandler::new(state.clone(), peer_service), state)
    }

    async fn read(handler: &ClientHandler, file_name: &str) -> String {
        let mut out: Vec<u8> = vec![];
        handler.handle_read(file_name, &mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn single_replica_write_commits_and_reads_back() {
        let (handler, state) = handler().await;
        let outcome = handler.handle_primary_write("report.txt", "hello").await;
        assert_eq!(outcome, WriteOutcome::Committed);
        assert_eq!(outcome.response(), "Write success");
        assert_eq!(read(&handler, "report.txt").await, "hello");
        // reading twice yields the same bytes
        assert_eq!(read(&handler, "report.txt").await, "hello");
        let _ = std::fs::remove_dir_all(state.store.root());
    }

    #[tokio::test]
    async fn missing_and_foreign_files_are_not_found() {
        let (handler, state) = handler().await;
        assert_eq!(
            read(&handler, "report.txt").await,
            "Error: File report.txt not found on server."
        );
        assert_eq!(
            read(&handler, "other.txt").await,
            "Error: File other.txt not found on server."
        );
        let outcome = handler.handle_primary_write("other.txt", "x").await;
        assert_eq!(outcome.response(), "Write failed");
        let _ = std::fs::remove_dir_all(state.store.root());
    }

    #[tokio::test]
    async fn stalled_reader_does_not_block_writes() {
        let (handler, state) = handler().await;
        let handler = Arc::new(handler);
        let big = "x".repeat(64 * 1024);
        handler.handle_primary_write("report.txt", &big).await;

        // nobody ever reads from the other end of this pipe
        let (mut stalled, _held_open) = tokio::io::duplex(64);
        let reading = {
            let handler = handler.clone();
            tokio::spawn(async move { handler.handle_read("report.txt", &mut stalled).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!reading.is_finished());

        let outcome = tokio::time::timeout(
            Duration::from_secs(1),
            handler.handle_primary_write("report.txt", "hello"),
        )
        .await
        .expect("write waited on a stalled reader");
        assert_eq!(outcome, WriteOutcome::Committed);
        assert_eq!(
            state.store.file_size("report.txt").await.unwrap(),
            64 * 1024 + 5
        );
        reading.abort();
        let _ = std::fs::remove_dir_all(state.store.root());
    }

    #[tokio::test]
    async fn reads_of_different_files_run_concurrently() {
        let (handler, state) = handler().await;
        handler.handle_primary_write("report.txt", "report").await;
        handler.handle_primary_write("notes.txt", "notes").await;
        // a held lock on one file must not block reading another
        let _report_lock = state.file_locks.lock("report.txt").await;
        let notes = tokio::time::timeout(Duration::from_secs(1), read(&handler, "notes.txt"))
            .await
            .unwrap();
        assert_eq!(notes, "notes");
        let _ = std::fs::remove_dir_all(state.store.root());
    }
}
