//! UDP DNS listener
//!
//! The standard DNS transport: one datagram per query, each handled on its
//! own task.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tracing::{debug, error};

use crate::dns::wire;
use crate::error::{Error, Result};
use crate::server::RequestHandler;

const MAX_PACKET_SIZE: usize = 512;

/// UDP DNS server.
pub struct UdpServer {
    socket: Arc<UdpSocket>,
    handler: Arc<dyn RequestHandler>,
}

impl UdpServer {
    /// Bind the listener.
    pub async fn new(addr: SocketAddr, handler: Arc<dyn RequestHandler>) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| Error::external_caused("failed to bind DNS listener", e))?;

        Ok(UdpServer {
            socket: Arc::new(socket),
            handler,
        })
    }

    /// Get the bound address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket
            .local_addr()
            .map_err(|e| Error::external_caused("failed to get local address", e))
    }

    /// Receive queries forever, spawning a task per datagram.
    pub async fn run(&self) -> Result<()> {
        let mut buf = vec![0u8; MAX_PACKET_SIZE];

        loop {
            match self.socket.recv_from(&mut buf).await {
                Ok((len, peer)) => {
                    let request = buf[..len].to_vec();
                    let handler = Arc::clone(&self.handler);
                    let socket = Arc::clone(&self.socket);

                    tokio::spawn(async move {
                        if let Err(err) = Self::handle_packet(&request, peer, handler, socket).await
                        {
                            error!(peer = %peer, reason = %err, "failed to handle query");
                        }
                    });
                }
                Err(err) => {
                    // Keep serving; a bad datagram must not stop the listener.
                    error!(reason = %err, "failed to receive packet");
                }
            }
        }
    }

    async fn handle_packet(
        request: &[u8],
        peer: SocketAddr,
        handler: Arc<dyn RequestHandler>,
        socket: Arc<UdpSocket>,
    ) -> Result<()> {
        let message = wire::parse_message(request)?;
        debug!(peer = %peer, id = message.id(), "received query");

        let reply = handler.handle(message).await?;
        let data = wire::serialize_message(&reply)?;

        socket
            .send_to(&data, peer)
            .await
            .map_err(|e| Error::external_caused("failed to send reply", e))?;

        Ok(())
    }
}
