use async_trait::async_trait;
use utilities::{error::GfsError, replica_directory::ChunkServerRecord};

#[async_trait]
pub trait ChunkServerSelectionPolicy {
    /// Chunk server that should serve a read of `file_name`.
    async fn select_for_read(&self, file_name: &str) -> Result<ChunkServerRecord, GfsError>;
    /// Chunk server that coordinates a write to `file_name`.
    async fn select_for_write(&self, file_name: &str) -> Result<ChunkServerRecord, GfsError>;
}
