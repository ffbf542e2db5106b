use storage::storage::Storage;
use utilities::{
    logger::{error, info, instrument, trace, tracing, warn},
    message::{WRITE_FAILED, WRITE_SUCCESS},
};

use crate::chunkserver_state::{ChunkServerState, PendingWrite};

/// Inbound side of replication: writes forwarded by a primary and the
/// rollbacks that may follow them.
pub struct PeerHandler {
    state: ChunkServerState,
}

impl PeerHandler {
    pub fn new(state: ChunkServerState) -> Self {
        Self { state }
    }

    /// Applies a forwarded write. The answer only reflects the local append,
    /// a secondary never forwards further.
    #[instrument(name = "peer_secondary_write", skip(self, data), fields(server_id = %self.state.server_id, bytes = data.len()))]
    pub async fn handle_secondary_write(
        &self,
        file_name: &str,
        data: &str,
        write_id: Option<String>,
    ) -> &'static str {
        if !self.state.manages(file_name) {
            error!(%file_name, "secondary write for a file this server does not hold");
            return WRITE_FAILED;
        }
        let _guard = self.state.file_locks.lock(file_name).await;
        match self.state.store.append(file_name, data.as_bytes()).await {
            Ok(receipt) => {
                self.state
                    .record_pending(file_name, PendingWrite { write_id, receipt })
                    .await;
                trace!(%file_name, "secondary write applied");
                WRITE_SUCCESS
            }
            Err(e) => {
                error!(%file_name, error = %e, "Error while appending a secondary write");
                WRITE_FAILED
            }
        }
    }

    #[instrument(name = "peer_rollback", skip(self), fields(server_id = %self.state.server_id))]
    pub async fn handle_rollback(&self, file_name: &str, write_id: Option<&str>) {
        if !self.state.manages(file_name) {
            warn!(%file_name, "rollback for a file this server does not hold");
            return;
        }
        let _guard = self.state.file_locks.lock(file_name).await;
        let Some(pending) = self.state.take_pending(file_name, write_id).await else {
            info!(%file_name, ?write_id, "nothing to roll back");
            return;
        };
        match self.state.store.undo(file_name, &pending.receipt).await {
            Ok(()) => info!(%file_name, ?write_id, "secondary write rolled back"),
            Err(e) => error!(%file_name, error = %e, "Error while rolling back"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::HashMap, sync::Arc};
    use storage::file_storage::FileStorage;
    use utilities::replica_directory::{ChunkServerRecord, ReplicaDirectory};

    async fn handler() -> (PeerHandler, ChunkServerState) {
        let directory = ReplicaDirectory::new(
            vec![
                ChunkServerRecord::new("A", "127.0.0.1", 6001),
                ChunkServerRecord::new("B", "127.0.0.1", 6002),
            ],
            HashMap::from([(
                "report.txt".to_owned(),
                vec!["A".to_owned(), "B".to_owned()],
            )]),
        )
        .unwrap();
        let root = std::env::temp_dir().join(format!("peer-handler-test-{}", uuid::Uuid::new_v4()));
        let store = FileStorage::new(root).await.unwrap();
        let state = ChunkServerState::new("B", Arc::new(directory), store);
        (PeerHandler::new(state.clone()), state)
    }

    async fn content(state: &ChunkServerState, file_name: &str) -> Option<String> {
        tokio::fs::read_to_string(state.store.root().join(file_name))
            .await
            .ok()
    }

    #[tokio::test]
    async fn rollback_with_stale_write_id_keeps_data() {
        let (handler, state) = handler().await;
        assert_eq!(
            handler
                .handle_secondary_write("report.txt", "hello", Some("w1".to_owned()))
                .await,
            WRITE_SUCCESS
        );
        handler.handle_rollback("report.txt", Some("w0")).await;
        assert_eq!(content(&state, "report.txt").await.as_deref(), Some("hello"));

        handler.handle_rollback("report.txt", Some("w1")).await;
        assert_eq!(content(&state, "report.txt").await, None);
        let _ = std::fs::remove_dir_all(state.store.root());
    }

    #[tokio::test]
    async fn rollback_truncates_back_to_previous_length() {
        let (handler, state) = handler().await;
        handler
            .handle_secondary_write("report.txt", "base", Some("w1".to_owned()))
            .await;
        handler
            .handle_secondary_write("report.txt", "-more", Some("w2".to_owned()))
            .await;
        handler.handle_rollback("report.txt", Some("w2")).await;
        assert_eq!(content(&state, "report.txt").await.as_deref(), Some("base"));
        // only the latest append can be undone
        handler.handle_rollback("report.txt", Some("w1")).await;
        assert_eq!(content(&state, "report.txt").await.as_deref(), Some("base"));
        let _ = std::fs::remove_dir_all(state.store.root());
    }

    #[tokio::test]
    async fn rejects_files_placed_elsewhere() {
        let (handler, state) = handler().await;
        assert_eq!(
            handler.handle_secondary_write("notes.txt", "x", None).await,
            WRITE_FAILED
        );
        assert_eq!(content(&state, "notes.txt").await, None);
        let _ = std::fs::remove_dir_all(state.store.root());
    }

    #[tokio::test]
    async fn rollback_of_foreign_file_leaves_its_lock_alone() {
        let (handler, state) = handler().await;
        let _held = state.file_locks.lock("notes.txt").await;
        tokio::time::timeout(
            std::time::Duration::from_secs(1),
            handler.handle_rollback("notes.txt", Some("w1")),
        )
        .await
        .expect("rollback of a foreign file waited on its lock");
        assert_eq!(content(&state, "notes.txt").await, None);
        let _ = std::fs::remove_dir_all(state.store.root());
    }
}
