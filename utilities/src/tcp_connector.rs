use std::time::Duration;
use tokio::{net::TcpStream, time::timeout};
use tracing::trace;

use crate::error::GfsError;

/// Opens outbound connections with a bounded connect time.
#[derive(Clone, Copy, Debug)]
pub struct TcpConnector {
    connect_timeout: Duration,
}
impl TcpConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
    pub async fn get_connection(&self, tcp_address: &str) -> Result<TcpStream, GfsError> {
        match timeout(self.connect_timeout, TcpStream::connect(tcp_address)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(GfsError::Connection(format!(
                "Error while connecting to stream at {tcp_address:?} {e:?}"
            ))),
            Err(_) => Err(GfsError::Connection(format!(
                "Timed out after {:?} while connecting to {tcp_address:?}",
                self.connect_timeout
            ))),
        }
    }
    /// Liveness probe: connect and close straight away without sending a request.
    pub async fn probe(&self, tcp_address: &str) -> Result<(), GfsError> {
        let stream = self.get_connection(tcp_address).await?;
        trace!(%tcp_address, "probe connected");
        drop(stream);
        Ok(())
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn reports_listening_and_closed_ports() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open_addrs = listener.local_addr().unwrap().to_string();
        let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let closed_addrs = closed.local_addr().unwrap().to_string();
        drop(closed);

        let connector = TcpConnector::new(Duration::from_millis(500));
        assert!(connector.probe(&open_addrs).await.is_ok());
        assert!(matches!(
            connector.probe(&closed_addrs).await,
            Err(GfsError::Connection(_))
        ));
    }
}
