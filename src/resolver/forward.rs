//! Forward resolver
//!
//! Recursion by first-level forwarding: the query is sent to each upstream
//! endpoint in turn over UDP, and the first upstream that answers without
//! a transport error wins. Transport errors fail over silently; exhausting
//! every upstream yields an empty answer, not an error, so composed
//! resolvers keep going.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::debug;

use crate::dns::{wire, Message, Question};
use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::record::Record;
use crate::resolver::{Request, Resolver, ResponseWriter};

const MAX_UDP_PAYLOAD: usize = 512;

/// A resolver that forwards queries to upstream DNS servers.
pub struct ForwardResolver {
    upstreams: Vec<SocketAddr>,
    timeout: Duration,
    metrics: Arc<Metrics>,
}

impl ForwardResolver {
    /// Create a forwarder over an ordered list of upstream endpoints with
    /// a per-attempt timeout.
    pub fn new(upstreams: Vec<SocketAddr>, timeout: Duration, metrics: Arc<Metrics>) -> Self {
        ForwardResolver {
            upstreams,
            timeout,
            metrics,
        }
    }

    /// One query/response exchange with a single upstream.
    async fn exchange(&self, upstream: SocketAddr, request: &[u8]) -> Result<Message> {
        let bind_addr: SocketAddr = if upstream.is_ipv4() {
            "0.0.0.0:0".parse().unwrap()
        } else {
            "[::]:0".parse().unwrap()
        };

        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| Error::external_caused("failed to bind socket", e))?;

        socket
            .send_to(request, upstream)
            .await
            .map_err(|e| Error::external_caused("failed to send query", e))?;

        let mut buf = vec![0u8; MAX_UDP_PAYLOAD];
        let (len, _) = timeout(self.timeout, socket.recv_from(&mut buf))
            .await
            .map_err(|_| Error::external(format!("upstream timed out: {}", upstream)))?
            .map_err(|e| Error::external_caused("failed to receive response", e))?;

        wire::parse_message(&buf[..len])
    }
}

#[async_trait]
impl Resolver for ForwardResolver {
    async fn resolve(&self, w: &mut dyn ResponseWriter, req: &Request) -> Result<()> {
        if !req.recursion_desired {
            return Ok(());
        }

        let mut query = Message::new();
        query.set_id(rand::random());
        query.set_recursion_desired(true);
        query.add_question(Question::new(req.name.as_str(), req.qtype, req.qclass));

        let request = wire::serialize_message(&query)?;

        for upstream in &self.upstreams {
            let start = Instant::now();
            let response = match self.exchange(*upstream, &request).await {
                Ok(response) if response.id() == query.id() => response,
                Ok(_) | Err(_) => {
                    debug!(upstream = %upstream, "upstream exchange failed");
                    continue;
                }
            };
            self.metrics.upstream_time(start.elapsed());

            for answer in response.answers() {
                let record = Record::from_rr(answer)?;
                w.set_no_authoritative();
                w.add(record)?;
            }
            break;
        }

        Ok(())
    }

    fn recursion_available(&self) -> bool {
        true
    }
}

impl fmt::Display for ForwardResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let addrs: Vec<String> = self.upstreams.iter().map(|a| a.to_string()).collect();
        write!(f, "ForwardResolver[{}]", addrs.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::{RData, RecordClass, RecordType, ResourceRecord};
    use crate::record::Domain;
    use crate::resolver::ResponseCallback;
    use std::net::Ipv4Addr;

    /// Serve one canned answer for every query received.
    async fn fake_upstream(answers: Vec<ResourceRecord>) -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();

        tokio::spawn(async move {
            let mut buf = vec![0u8; MAX_UDP_PAYLOAD];
            while let Ok((len, peer)) = socket.recv_from(&mut buf).await {
                let request = wire::parse_message(&buf[..len]).unwrap();
                let mut reply = Message::reply_to(&request);
                reply.set_authoritative(true);
                for answer in &answers {
                    reply.add_answer(answer.clone());
                }
                let data = wire::serialize_message(&reply).unwrap();
                let _ = socket.send_to(&data, peer).await;
            }
        });

        addr
    }

    fn request(recursion_desired: bool) -> Request {
        Request::new(
            Domain::new("example.com.").unwrap(),
            RecordType::A,
            recursion_desired,
        )
    }

    #[tokio::test]
    async fn forwards_to_the_first_healthy_upstream() {
        let upstream = fake_upstream(vec![ResourceRecord::new(
            "example.com.",
            RecordType::A,
            RecordClass::IN,
            10,
            RData::A(Ipv4Addr::new(127, 2, 3, 4)),
        )])
        .await;

        let metrics = Arc::new(Metrics::new("fwd_test").unwrap());
        // The first upstream does not exist; failover is silent.
        let dead: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let resolver =
            ForwardResolver::new(vec![dead, upstream], Duration::from_millis(500), metrics);

        let mut records = Vec::new();
        let authoritative;
        {
            let mut writer = ResponseCallback::new(|r| {
                records.push(r.to_string());
                Ok(())
            });
            resolver.resolve(&mut writer, &request(true)).await.unwrap();
            authoritative = writer.is_authoritative();
        }

        assert_eq!(records, vec!["example.com. 10 IN A 127.2.3.4"]);
        assert!(!authoritative);
        assert!(resolver.recursion_available());
    }

    #[tokio::test]
    async fn ignores_requests_without_recursion_desired() {
        let upstream = fake_upstream(vec![]).await;
        let metrics = Arc::new(Metrics::new("fwd_test").unwrap());
        let resolver = ForwardResolver::new(vec![upstream], Duration::from_millis(500), metrics);

        let mut count = 0;
        let mut writer = ResponseCallback::new(|_| {
            count += 1;
            Ok(())
        });
        resolver.resolve(&mut writer, &request(false)).await.unwrap();
        drop(writer);

        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn exhausted_upstreams_return_empty_not_error() {
        let metrics = Arc::new(Metrics::new("fwd_test").unwrap());
        let dead: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let resolver = ForwardResolver::new(vec![dead], Duration::from_millis(100), metrics);

        let mut writer = ResponseCallback::new(|_| Ok(()));
        assert!(resolver.resolve(&mut writer, &request(true)).await.is_ok());
    }
}
