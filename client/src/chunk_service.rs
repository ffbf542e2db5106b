use std::time::Duration;

use tokio::io::AsyncWriteExt;
use utilities::{
    error::GfsError,
    logger::{instrument, trace, tracing},
    message::{
        ChunkRequest, WRITE_FAILED, WRITE_SUCCESS, WriteRole, read_response, write_message,
    },
    tcp_connector::TcpConnector,
};

/// Talks to chunk servers directly once the master picked one.
#[derive(Clone, Debug)]
pub struct ChunkService {
    connector: TcpConnector,
    max_response_bytes: usize,
    read_timeout: Duration,
}

impl ChunkService {
    pub fn new(connector: TcpConnector, max_response_bytes: usize, read_timeout: Duration) -> Self {
        Self {
            connector,
            max_response_bytes,
            read_timeout,
        }
    }

    async fn exchange(&self, address: &str, request: &ChunkRequest) -> Result<Vec<u8>, GfsError> {
        let mut stream = self.connector.get_connection(address).await?;
        let exchange = async {
            write_message(&mut stream, request).await?;
            stream
                .shutdown()
                .await
                .map_err(|e| GfsError::Connection(e.to_string()))?;
            read_response(&mut stream, self.max_response_bytes).await
        };
        tokio::time::timeout(self.read_timeout, exchange)
            .await
            .map_err(|_| {
                GfsError::Connection(format!(
                    "chunk server {address} did not answer within {:?}",
                    self.read_timeout
                ))
            })?
    }

    /// Whole content of the file. A stored file whose content starts with an
    /// error message can't be told apart from a refusal.
    #[instrument(skip(self))]
    pub async fn fetch_file(&self, address: &str, file_name: &str) -> Result<Vec<u8>, GfsError> {
        let request = ChunkRequest::Read {
            file_name: file_name.to_owned(),
        };
        let content = self.exchange(address, &request).await?;
        if content.starts_with(b"Error") {
            let message = String::from_utf8_lossy(&content);
            if let Some(e) = GfsError::from_response(&message) {
                return Err(e);
            }
        }
        trace!(bytes = content.len(), "file fetched");
        Ok(content)
    }

    #[instrument(skip(self, data), fields(bytes = data.len()))]
    pub async fn write_file(&self, address: &str, file_name: &str, data: &str) -> Result<(), GfsError> {
        let request = ChunkRequest::Write {
            file_name: file_name.to_owned(),
            data: data.to_owned(),
            role: WriteRole::Primary,
            write_id: None,
        };
        let response = self.exchange(address, &request).await?;
        match String::from_utf8_lossy(&response).trim() {
            WRITE_SUCCESS => Ok(()),
            WRITE_FAILED => Err(GfsError::Replication(format!(
                "primary at {address} reported {WRITE_FAILED}"
            ))),
            other => Err(GfsError::Protocol(format!(
                "unexpected write response {other:?}"
            ))),
        }
    }
}
