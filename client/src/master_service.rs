use std::time::Duration;

use tokio::io::AsyncWriteExt;
use utilities::{
    error::GfsError,
    logger::{debug, instrument, tracing},
    message::{MasterRequest, MasterResponse, PrimaryLocation, read_response, write_message},
    tcp_connector::TcpConnector,
};

// an address or a small json object, never more
const MAX_MASTER_RESPONSE_BYTES: usize = 4096;

/// Asks the master where a file lives.
#[derive(Clone, Debug)]
pub struct MasterService {
    master_addrs: String,
    connector: TcpConnector,
    read_timeout: Duration,
}

impl MasterService {
    pub fn new(master_addrs: &str, connector: TcpConnector, read_timeout: Duration) -> Self {
        Self {
            master_addrs: master_addrs.to_owned(),
            connector,
            read_timeout,
        }
    }

    async fn ask(&self, request: &MasterRequest) -> Result<Vec<u8>, GfsError> {
        let mut stream = self.connector.get_connection(&self.master_addrs).await?;
        let exchange = async {
            write_message(&mut stream, request).await?;
            stream
                .shutdown()
                .await
                .map_err(|e| GfsError::Connection(e.to_string()))?;
            read_response(&mut stream, MAX_MASTER_RESPONSE_BYTES).await
        };
        tokio::time::timeout(self.read_timeout, exchange)
            .await
            .map_err(|_| {
                GfsError::Connection(format!(
                    "master {} did not answer within {:?}",
                    self.master_addrs, self.read_timeout
                ))
            })?
    }

    /// Address of the chunk server that should serve the read.
    #[instrument(skip(self))]
    pub async fn locate_for_read(&self, file_name: &str) -> Result<String, GfsError> {
        let raw = self
            .ask(&MasterRequest::Read {
                file_name: file_name.to_owned(),
            })
            .await?;
        let address = MasterResponse::decode_read(&raw)?;
        debug!(%address, "master assigned a chunk server");
        Ok(address)
    }

    #[instrument(skip(self))]
    pub async fn locate_primary(&self, file_name: &str) -> Result<PrimaryLocation, GfsError> {
        let raw = self
            .ask(&MasterRequest::Write {
                file_name: file_name.to_owned(),
            })
            .await?;
        MasterResponse::decode_write(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn silent_master_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        // accepts and keeps the connection open without ever answering
        let silent = tokio::spawn(async move {
            let mut held = vec![];
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                held.push(stream);
            }
        });
        let master = MasterService::new(
            &addr,
            TcpConnector::new(Duration::from_millis(500)),
            Duration::from_millis(200),
        );
        let result = tokio::time::timeout(
            Duration::from_secs(2),
            master.locate_for_read("report.txt"),
        )
        .await
        .expect("lookup was not bounded by the read timeout");
        assert!(matches!(result, Err(GfsError::Connection(_))));
        silent.abort();
    }
}
