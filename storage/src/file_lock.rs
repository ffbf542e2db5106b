use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

pub type FileGuard = OwnedMutexGuard<()>;

/// One lock per file name. Appends to different files never wait on each
/// other, appends to the same file run one at a time.
#[derive(Clone, Debug, Default)]
pub struct FileLocks {
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl FileLocks {
    pub fn new() -> Self {
        Self::default()
    }
    pub async fn lock(&self, file_name: &str) -> FileGuard {
        let file_lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(file_name.to_owned()).or_default().clone()
        };
        trace!(%file_name, "waiting for file lock");
        file_lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn same_file_is_serialized() {
        let locks = FileLocks::new();
        let guard = locks.lock("report.txt").await;
        let waiting = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock("report.txt").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiting.is_finished());
        drop(guard);
        timeout(Duration::from_secs(1), waiting)
            .await
            .expect("second writer never got the lock")
            .unwrap();
    }

    #[tokio::test]
    async fn different_files_do_not_block() {
        let locks = FileLocks::new();
        let _report = locks.lock("report.txt").await;
        let notes = timeout(Duration::from_secs(1), locks.lock("notes.txt")).await;
        assert!(notes.is_ok());
    }
}
