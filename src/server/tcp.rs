//! TCP DNS listener
//!
//! DNS over TCP per RFC 1035: each message is prefixed with a two-byte
//! big-endian length. Every accepted connection serves one query on its
//! own task and is closed after the reply.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error};

use crate::dns::wire;
use crate::error::{Error, Result};
use crate::server::RequestHandler;

const MAX_MESSAGE_SIZE: usize = 65535;

/// TCP DNS server.
pub struct TcpServer {
    listener: TcpListener,
    handler: Arc<dyn RequestHandler>,
}

impl TcpServer {
    /// Bind the listener.
    pub async fn new(addr: SocketAddr, handler: Arc<dyn RequestHandler>) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::external_caused("failed to bind DNS listener", e))?;

        Ok(TcpServer { listener, handler })
    }

    /// Get the bound address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| Error::external_caused("failed to get local address", e))
    }

    /// Accept connections forever, spawning a task per connection.
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    debug!(peer = %peer, "accepted connection");
                    let handler = Arc::clone(&self.handler);

                    tokio::spawn(async move {
                        if let Err(err) = Self::handle_connection(stream, handler).await {
                            error!(peer = %peer, reason = %err, "failed to handle connection");
                        }
                    });
                }
                Err(err) => {
                    error!(reason = %err, "failed to accept connection");
                }
            }
        }
    }

    async fn handle_connection(
        mut stream: TcpStream,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<()> {
        let mut len_buf = [0u8; 2];
        stream
            .read_exact(&mut len_buf)
            .await
            .map_err(|e| Error::external_caused("failed to read message length", e))?;

        let len = usize::from(u16::from_be_bytes(len_buf));
        if len > MAX_MESSAGE_SIZE {
            return Err(Error::argument(format!("message too large: {}", len)));
        }

        let mut request = vec![0u8; len];
        stream
            .read_exact(&mut request)
            .await
            .map_err(|e| Error::external_caused("failed to read message", e))?;

        let message = wire::parse_message(&request)?;
        let reply = handler.handle(message).await?;
        let data = wire::serialize_message(&reply)?;

        let len = u16::try_from(data.len())
            .map_err(|_| Error::internal(format!("reply too large: {}", data.len())))?;
        stream
            .write_all(&len.to_be_bytes())
            .await
            .map_err(|e| Error::external_caused("failed to write reply", e))?;
        stream
            .write_all(&data)
            .await
            .map_err(|e| Error::external_caused("failed to write reply", e))?;

        Ok(())
    }
}
