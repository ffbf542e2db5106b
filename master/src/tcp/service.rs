use std::{net::SocketAddr, sync::Arc, time::Duration};

use tokio::{
    io::AsyncWriteExt,
    net::{TcpListener, TcpStream},
    time::timeout,
};
use utilities::{
    error::GfsError,
    logger::{Instrument, Span, debug, error, trace},
    message::{MasterRequest, MasterResponse, read_message},
    result::Result,
};

use crate::client_handler::ClientHandler;

/// Accepts client lookups, one request per connection.
pub struct TCPService {
    listener: TcpListener,
    handler: Arc<ClientHandler>,
    request_timeout: Duration,
    max_request_bytes: usize,
}

impl TCPService {
    pub fn new(
        listener: TcpListener,
        handler: Arc<ClientHandler>,
        request_timeout: Duration,
        max_request_bytes: usize,
    ) -> Self {
        Self {
            listener,
            handler,
            request_timeout,
            max_request_bytes,
        }
    }
    pub async fn bind(
        address: &str,
        handler: Arc<ClientHandler>,
        request_timeout: Duration,
        max_request_bytes: usize,
    ) -> Result<Self> {
        let listener = TcpListener::bind(address).await?;
        Ok(Self::new(
            listener,
            handler,
            request_timeout,
            max_request_bytes,
        ))
    }
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
    pub async fn start_and_accept(&self) -> Result<()> {
        loop {
            let (tcp_stream, peer) = match self.listener.accept().await {
                Ok(v) => v,
                Err(e) => {
                    error!(error = %e, "error while accepting a connection");
                    continue;
                }
            };
            let handler = self.handler.clone();
            let request_timeout = self.request_timeout;
            let max_request_bytes = self.max_request_bytes;
            tokio::spawn(
                async move {
                    if let Err(e) = Self::handle_connection(
                        tcp_stream,
                        handler,
                        request_timeout,
                        max_request_bytes,
                    )
                    .await
                    {
                        error!(%peer, "error while handling the tcp connection {e}");
                    }
                }
                .instrument(Span::current()),
            );
        }
    }
    async fn handle_connection(
        mut tcp_stream: TcpStream,
        handler: Arc<ClientHandler>,
        request_timeout: Duration,
        max_request_bytes: usize,
    ) -> Result<()> {
        let request = match timeout(
            request_timeout,
            read_message::<MasterRequest>(&mut tcp_stream, max_request_bytes),
        )
        .await
        {
            Ok(Ok(Some(request))) => request,
            Ok(Ok(None)) => {
                trace!("connection closed without a request");
                return Ok(());
            }
            Ok(Err(e)) => {
                // malformed requests still get an answer before we hang up
                if let Err(write_error) = tcp_stream.write_all(e.to_string().as_bytes()).await {
                    debug!(error = %write_error, "could not answer the malformed request");
                }
                return Err(e.into());
            }
            Err(_) => {
                return Err(GfsError::Connection(format!(
                    "no request received within {request_timeout:?}"
                ))
                .into());
            }
        };
        debug!(?request, "request received");
        let response: MasterResponse = handler.handle_request(request).await;
        tcp_stream.write_all(&response.encode()).await?;
        tcp_stream.shutdown().await?;
        Ok(())
    }
}
