use std::{net::SocketAddr, sync::Arc, time::Duration};

use tokio::{
    io::AsyncWriteExt,
    net::{TcpListener, TcpStream},
    time::timeout,
};
use utilities::{
    error::GfsError,
    logger::{Instrument, Level, Span, debug, error, span, trace},
    message::{ChunkRequest, WriteRole, read_message},
    result::Result,
};

use crate::{client::handler::ClientHandler, peer::handler::PeerHandler};

/// Accepts reads, writes and rollbacks for one chunk server.
pub struct TCPService {
    listener: TcpListener,
    client_handler: Arc<ClientHandler>,
    peer_handler: Arc<PeerHandler>,
    request_timeout: Duration,
    max_request_bytes: usize,
}

impl TCPService {
    pub fn new(
        listener: TcpListener,
        client_handler: Arc<ClientHandler>,
        peer_handler: Arc<PeerHandler>,
        request_timeout: Duration,
        max_request_bytes: usize,
    ) -> Self {
        Self {
            listener,
            client_handler,
            peer_handler,
            request_timeout,
            max_request_bytes,
        }
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
            let client_handler = self.client_handler.clone();
            let peer_handler = self.peer_handler.clone();
            let request_timeout = self.request_timeout;
            let max_request_bytes = self.max_request_bytes;
            tokio::spawn(
                async move {
                    if let Err(e) = Self::handle_connection(
                        tcp_stream,
                        client_handler,
                        peer_handler,
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
        client_handler: Arc<ClientHandler>,
        peer_handler: Arc<PeerHandler>,
        request_timeout: Duration,
        max_request_bytes: usize,
    ) -> Result<()> {
        let request = match timeout(
            request_timeout,
            read_message::<ChunkRequest>(&mut tcp_stream, max_request_bytes),
        )
        .await
        {
            Ok(Ok(Some(request))) => request,
            Ok(Ok(None)) => {
                trace!("connection closed without a request");
                return Ok(());
            }
            Ok(Err(e)) => {
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
        match request {
            ChunkRequest::Read { file_name } => {
                let span = span!(Level::INFO, "tcp_read", %file_name);
                client_handler
                    .handle_read(&file_name, &mut tcp_stream)
                    .instrument(span)
                    .await?;
            }
            ChunkRequest::Write {
                file_name,
                data,
                role: WriteRole::Primary,
                ..
            } => {
                let outcome = client_handler.handle_primary_write(&file_name, &data).await;
                tcp_stream.write_all(outcome.response().as_bytes()).await?;
            }
            ChunkRequest::Write {
                file_name,
                data,
                role: WriteRole::Secondary,
                write_id,
            } => {
                let response = peer_handler
                    .handle_secondary_write(&file_name, &data, write_id)
                    .await;
                tcp_stream.write_all(response.as_bytes()).await?;
            }
            ChunkRequest::Rollback {
                file_name,
                write_id,
            } => {
                // the primary waits for this connection to close
                peer_handler
                    .handle_rollback(&file_name, write_id.as_deref())
                    .await;
            }
        }
        tcp_stream.shutdown().await?;
        Ok(())
    }
}
