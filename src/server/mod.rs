//! Server composition
//!
//! Glue that runs a DNS listener (UDP or TCP) and the HTTP listener
//! (management API plus metrics) concurrently, wired to one resolver
//! pipeline. A watch-channel cancellation stops both; an early fatal from
//! either stops the other and surfaces the error.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::header;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;
use tokio::sync::watch;
use tracing::info;

use crate::api;
use crate::dns::Message;
use crate::error::{Error, Result};
use crate::handler::Handler;
use crate::metrics::Metrics;
use crate::resolver::{DynamicResolver, Resolver};

pub mod tcp;
pub mod udp;

pub use tcp::TcpServer;
pub use udp::UdpServer;

/// DNS request handler: one wire message in, one wire message out.
///
/// The listeners stay protocol plumbing; everything DNS-shaped happens
/// behind this trait.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Handle one request message and produce the reply.
    async fn handle(&self, request: Message) -> Result<Message>;
}

/// Transport protocol of the DNS listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Proto {
    #[default]
    Udp,
    Tcp,
}

impl FromStr for Proto {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "udp" | "" => Ok(Proto::Udp),
            "tcp" => Ok(Proto::Tcp),
            _ => Err(Error::argument(format!("invalid protocol: {}", s))),
        }
    }
}

impl fmt::Display for Proto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Proto::Udp => write!(f, "udp"),
            Proto::Tcp => write!(f, "tcp"),
        }
    }
}

/// The server instance: resolver pipeline plus its management surfaces.
pub struct Server {
    /// Name shown on the HTTP front page.
    pub name: String,
    pub metrics: Arc<Metrics>,
    /// The dynamic zone, exposed through the management API.
    pub dynamic_resolver: Arc<dyn DynamicResolver>,
    /// The full pipeline answering DNS queries. Must include the dynamic
    /// resolver.
    pub resolver: Arc<dyn Resolver>,
}

impl Server {
    /// Build the HTTP router: front page, Prometheus metrics, and the
    /// management API nested under `/api`.
    pub fn http_router(&self) -> Router {
        let name = if self.name.is_empty() {
            "emberdns".to_string()
        } else {
            self.name.clone()
        };
        let metrics = Arc::clone(&self.metrics);

        Router::new()
            .route(
                "/",
                get(move || {
                    let name = name.clone();
                    async move {
                        Html(format!(
                            "<h1>{}</h1><a href=\"/metrics\">metrics</a> <a href=\"/api/v1\">records</a>\n",
                            name
                        ))
                    }
                }),
            )
            .route(
                "/metrics",
                get(move || {
                    let metrics = Arc::clone(&metrics);
                    async move {
                        let text_plain = [(header::CONTENT_TYPE, "text/plain; charset=utf-8")];
                        match metrics.gather() {
                            Ok(text) => {
                                (axum::http::StatusCode::OK, text_plain, text).into_response()
                            }
                            Err(err) => (
                                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                                text_plain,
                                err.to_string(),
                            )
                                .into_response(),
                        }
                    }
                }),
            )
            .nest("/api", api::router(Arc::clone(&self.dynamic_resolver)))
    }

    /// Make the DNS handler for this server's pipeline.
    pub fn dns_handler(&self) -> Handler {
        Handler::new(Arc::clone(&self.resolver), Arc::clone(&self.metrics))
    }

    /// Serve DNS and HTTP until `shutdown` fires or either listener fails.
    pub async fn listen_and_serve(
        &self,
        api_addr: SocketAddr,
        dns_addr: SocketAddr,
        proto: Proto,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let router = self.http_router();
        let handler: Arc<dyn RequestHandler> = Arc::new(self.dns_handler());

        let http_listener = tokio::net::TcpListener::bind(api_addr)
            .await
            .map_err(|e| Error::external_caused("failed to bind API listener", e))?;
        info!(address = %api_addr, "starting API server");

        let mut http = tokio::spawn(async move {
            axum::serve(
                http_listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .map_err(|e| Error::external_caused("fatal error on HTTP server", e))
        });

        info!(address = %dns_addr, proto = %proto, "starting DNS server");
        let mut dns = match proto {
            Proto::Udp => {
                let server = UdpServer::new(dns_addr, handler).await?;
                tokio::spawn(async move { server.run().await })
            }
            Proto::Tcp => {
                let server = TcpServer::new(dns_addr, handler).await?;
                tokio::spawn(async move { server.run().await })
            }
        };

        tokio::select! {
            result = &mut http => {
                dns.abort();
                Err(flatten(result, "fatal error on HTTP server"))
            }
            result = &mut dns => {
                http.abort();
                Err(flatten(result, "fatal error on DNS server"))
            }
            _ = shutdown.changed() => {
                http.abort();
                dns.abort();
                Ok(())
            }
        }
    }
}

fn flatten(result: std::result::Result<Result<()>, tokio::task::JoinError>, context: &str) -> Error {
    match result {
        Ok(Ok(())) => Error::internal(format!("{}: listener stopped unexpectedly", context)),
        Ok(Err(err)) => err,
        Err(join) => Error::internal_caused(context, join),
    }
}
