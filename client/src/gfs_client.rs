use utilities::{
    error::GfsError,
    logger::{info, instrument, tracing},
    retry_policy::RetryPolicy,
};

use crate::{chunk_service::ChunkService, master_service::MasterService};

/// Read and write whole files: look the server up on the master, then talk to
/// that chunk server. Every attempt starts over at the master.
#[derive(Clone, Debug)]
pub struct GfsClient {
    master: MasterService,
    chunk: ChunkService,
    retry_policy: RetryPolicy,
}

impl GfsClient {
    pub fn new(master: MasterService, chunk: ChunkService, retry_policy: RetryPolicy) -> Self {
        Self {
            master,
            chunk,
            retry_policy,
        }
    }

    #[instrument(skip(self))]
    pub async fn read_file(&self, file_name: &str) -> Result<Vec<u8>, GfsError> {
        self.retry_policy
            .retry(
                move |attempt| async move {
                    let address = self.master.locate_for_read(file_name).await?;
                    info!(attempt, %address, "reading from chunk server");
                    self.chunk.fetch_file(&address, file_name).await
                },
                // replicas may come back on the next health check
                |e| matches!(e, GfsError::Connection(_) | GfsError::NoServerAvailable(_)),
            )
            .await
    }

    /// Not exactly-once: when the connection drops after the primary
    /// committed, the retry appends the data again.
    #[instrument(skip(self, data), fields(bytes = data.len()))]
    pub async fn write_file(&self, file_name: &str, data: &str) -> Result<(), GfsError> {
        self.retry_policy
            .retry(
                move |attempt| async move {
                    let primary = self.master.locate_primary(file_name).await?;
                    info!(attempt, address = %primary.tcp_address(), "writing through primary");
                    self.chunk
                        .write_file(&primary.tcp_address(), file_name, data)
                        .await
                },
                |e| !matches!(e, GfsError::FileNotFound(_) | GfsError::Protocol(_)),
            )
            .await
    }
}
