use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use storage::{file_lock::FileLocks, file_storage::FileStorage, storage::AppendReceipt};
use tokio::sync::Mutex;
use utilities::replica_directory::ReplicaDirectory;

/// Undo record of the latest append a secondary applied to a file.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingWrite {
    pub write_id: Option<String>,
    pub receipt: AppendReceipt,
}

/// Per chunk server state shared by every connection it accepts.
#[derive(Clone, Debug)]
pub struct ChunkServerState {
    pub server_id: String,
    pub directory: Arc<ReplicaDirectory>,
    pub store: FileStorage,
    pub file_locks: FileLocks,
    managed_files: Arc<HashSet<String>>,
    pending_writes: Arc<Mutex<HashMap<String, PendingWrite>>>,
}

impl ChunkServerState {
    pub fn new(server_id: &str, directory: Arc<ReplicaDirectory>, store: FileStorage) -> Self {
        Self {
            server_id: server_id.to_owned(),
            managed_files: Arc::new(directory.files_managed_by(server_id)),
            directory,
            store,
            file_locks: FileLocks::new(),
            pending_writes: Arc::default(),
        }
    }
    pub fn manages(&self, file_name: &str) -> bool {
        self.managed_files.contains(file_name)
    }
    /// Replaces the undo record of `file_name`; only the latest append can be
    /// rolled back.
    pub async fn record_pending(&self, file_name: &str, pending: PendingWrite) {
        self.pending_writes
            .lock()
            .await
            .insert(file_name.to_owned(), pending);
    }
    /// Removes and returns the undo record of `file_name` if it belongs to
    /// `write_id`. Without an id the latest record is taken.
    pub async fn take_pending(
        &self,
        file_name: &str,
        write_id: Option<&str>,
    ) -> Option<PendingWrite> {
        let mut pending_writes = self.pending_writes.lock().await;
        let matches = match (pending_writes.get(file_name), write_id) {
            (Some(_), None) => true,
            (Some(pending), Some(write_id)) => pending.write_id.as_deref() == Some(write_id),
            (None, _) => false,
        };
        if matches {
            pending_writes.remove(file_name)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use utilities::replica_directory::ChunkServerRecord;

    fn receipt(previous_len: u64) -> AppendReceipt {
        AppendReceipt {
            previous_len,
            bytes_written: 5,
            created: false,
        }
    }

    async fn state() -> ChunkServerState {
        let directory = ReplicaDirectory::new(
            vec![ChunkServerRecord::new("A", "127.0.0.1", 6001)],
            HashMap::from([("report.txt".to_owned(), vec!["A".to_owned()])]),
        )
        .unwrap();
        let root =
            std::env::temp_dir().join(format!("chunkserver-state-test-{}", uuid::Uuid::new_v4()));
        let store = FileStorage::new(root).await.unwrap();
        ChunkServerState::new("A", Arc::new(directory), store)
    }

    #[tokio::test]
    async fn manages_only_placed_files() {
        let state = state().await;
        assert!(state.manages("report.txt"));
        assert!(!state.manages("notes.txt"));
        let _ = std::fs::remove_dir_all(state.store.root());
    }

    #[tokio::test]
    async fn pending_write_is_taken_only_by_its_id() {
        let state = state().await;
        let pending = PendingWrite {
            write_id: Some("w1".to_owned()),
            receipt: receipt(3),
        };
        state.record_pending("report.txt", pending.clone()).await;
        assert_eq!(state.take_pending("report.txt", Some("w0")).await, None);
        assert_eq!(
            state.take_pending("report.txt", Some("w1")).await,
            Some(pending)
        );
        assert_eq!(state.take_pending("report.txt", Some("w1")).await, None);

        state
            .record_pending(
                "report.txt",
                PendingWrite {
                    write_id: Some("w2".to_owned()),
                    receipt: receipt(8),
                },
            )
            .await;
        let latest = state.take_pending("report.txt", None).await.unwrap();
        assert_eq!(latest.receipt.previous_len, 8);
        let _ = std::fs::remove_dir_all(state.store.root());
    }
}
