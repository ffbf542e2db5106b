use std::error::Error;

use tokio::io;

pub type Result<T> = std::result::Result<T, Box<dyn Error + Send + Sync>>;

/// Enough information to put a file back the way it was before an append.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AppendReceipt {
    pub previous_len: u64,
    pub bytes_written: u64,
    // the append created the file
    pub created: bool,
}

/// Local, append-only file storage of a chunk server. Callers serialize
/// writers of the same file (see `file_lock::FileLocks`).
pub trait Storage {
    async fn append(&self, file_name: &str, data: &[u8]) -> Result<AppendReceipt>;
    /// Reverts the append described by `receipt`.
    async fn undo(&self, file_name: &str, receipt: &AppendReceipt) -> Result<()>;
    async fn read(&self, file_name: &str) -> Result<Box<dyn io::AsyncRead + Unpin + Send>>;
    async fn contains(&self, file_name: &str) -> bool;
    async fn file_size(&self, file_name: &str) -> Result<u64>;
    async fn available_files(&self) -> Result<Vec<String>>;
}
