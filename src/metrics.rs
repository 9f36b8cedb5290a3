//! Metrics collection and Prometheus exposition
//!
//! Counters for received messages, resolutions by source, resolution
//! errors, and cache hits/misses, plus two latency histograms. A
//! [`Metrics`] instance owns its own registry so the metric namespace is
//! configurable per server.

use std::time::{Duration, Instant};

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};

use crate::dns::{Message, OpCode, RecordType};
use crate::error::{Error, Result};
use crate::resolver::Request;

/// The metrics collector for the Prometheus.
pub struct Metrics {
    registry: Registry,
    received: IntCounterVec,
    resolve: IntCounterVec,
    resolve_error: IntCounterVec,
    cache: IntCounterVec,
    resolve_time: Histogram,
    upstream_time: Histogram,
}

fn register<C: prometheus::core::Collector + Clone + 'static>(
    registry: &Registry,
    collector: C,
) -> Result<C> {
    registry
        .register(Box::new(collector.clone()))
        .map_err(|e| Error::external_caused("failed to register metric", e))?;
    Ok(collector)
}

impl Metrics {
    /// Create a collector with every metric registered under `namespace`.
    pub fn new(namespace: &str) -> Result<Self> {
        let registry = Registry::new();

        let received = register(
            &registry,
            IntCounterVec::new(
                Opts::new("received_message_count", "Number of received DNS messages.")
                    .namespace(namespace),
                &["type"],
            )
            .map_err(|e| Error::internal_caused("failed to create metric", e))?,
        )?;

        let resolve = register(
            &registry,
            IntCounterVec::new(
                Opts::new("resolve_count", "Number of resolved queries by source.")
                    .namespace(namespace),
                &["source", "type"],
            )
            .map_err(|e| Error::internal_caused("failed to create metric", e))?,
        )?;

        let resolve_error = register(
            &registry,
            IntCounterVec::new(
                Opts::new("resolve_error_count", "Number of failed resolutions.")
                    .namespace(namespace),
                &["type"],
            )
            .map_err(|e| Error::internal_caused("failed to create metric", e))?,
        )?;

        let cache = register(
            &registry,
            IntCounterVec::new(
                Opts::new("cache_count", "Number of cache hits and misses.").namespace(namespace),
                &["cache", "type"],
            )
            .map_err(|e| Error::internal_caused("failed to create metric", e))?,
        )?;

        let resolve_time = register(
            &registry,
            Histogram::with_opts(
                HistogramOpts::new("resolve_duration_seconds", "Total resolve duration.")
                    .namespace(namespace),
            )
            .map_err(|e| Error::internal_caused("failed to create metric", e))?,
        )?;

        let upstream_time = register(
            &registry,
            Histogram::with_opts(
                HistogramOpts::new(
                    "upstream_resolve_duration_seconds",
                    "Upstream resolve duration.",
                )
                .namespace(namespace),
            )
            .map_err(|e| Error::internal_caused("failed to create metric", e))?,
        )?;

        Ok(Metrics {
            registry,
            received,
            resolve,
            resolve_error,
            cache,
            resolve_time,
            upstream_time,
        })
    }

    /// Start the timer for one received message, counting it as a query or
    /// as another kind of message. The returned timer classifies the
    /// response when finished.
    pub fn start(&self, request: &Message) -> ResolveTimer<'_> {
        if request.opcode() == OpCode::Query {
            self.received.with_label_values(&["query"]).inc();
        } else {
            self.received.with_label_values(&["another"]).inc();
        }

        ResolveTimer {
            metrics: self,
            start: Instant::now(),
        }
    }

    /// Count a resolution error.
    pub fn error(&self, req: &Request) {
        if let Some(qtype) = type_label(req.qtype) {
            self.resolve_error.with_label_values(&[qtype]).inc();
        }
    }

    /// Record one upstream round trip.
    pub fn upstream_time(&self, duration: Duration) {
        self.upstream_time.observe(duration.as_secs_f64());
    }

    /// Count a cache hit.
    pub fn cache_hit(&self, req: &Request) {
        if let Some(qtype) = type_label(req.qtype) {
            self.cache.with_label_values(&["hit", qtype]).inc();
        }
    }

    /// Count a cache miss.
    pub fn cache_miss(&self, req: &Request) {
        if let Some(qtype) = type_label(req.qtype) {
            self.cache.with_label_values(&["miss", qtype]).inc();
        }
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn gather(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| Error::internal_caused("failed to encode metrics", e))?;
        String::from_utf8(buffer).map_err(|e| Error::internal_caused("failed to encode metrics", e))
    }
}

/// Label value for a record type; unknown types are left uncounted to keep
/// the label space bounded.
fn type_label(qtype: RecordType) -> Option<&'static str> {
    match qtype {
        RecordType::A => Some("A"),
        RecordType::NS => Some("NS"),
        RecordType::CNAME => Some("CNAME"),
        RecordType::PTR => Some("PTR"),
        RecordType::MX => Some("MX"),
        RecordType::TXT => Some("TXT"),
        RecordType::AAAA => Some("AAAA"),
        RecordType::SRV => Some("SRV"),
        RecordType::Unknown(_) => None,
    }
}

/// Timer handle between receiving a message and writing its reply.
pub struct ResolveTimer<'a> {
    metrics: &'a Metrics,
    start: Instant,
}

impl ResolveTimer<'_> {
    /// Observe the elapsed time and classify the response: empty answers
    /// count as not-found, non-authoritative answers as upstream, and
    /// authoritative answers as local, per question type.
    pub fn finish(self, response: &Message) {
        self.metrics
            .resolve_time
            .observe(self.start.elapsed().as_secs_f64());

        let source = if response.answers().is_empty() {
            "not-found"
        } else if response.is_authoritative() {
            "local"
        } else {
            "upstream"
        };

        for question in response.questions() {
            if let Some(qtype) = type_label(question.qtype()) {
                self.metrics
                    .resolve
                    .with_label_values(&[source, qtype])
                    .inc();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::{Question, RData, RecordClass, ResourceRecord};
    use crate::record::Domain;
    use std::net::Ipv4Addr;

    fn query() -> Message {
        let mut msg = Message::new();
        msg.add_question(Question::new("example.com.", RecordType::A, RecordClass::IN));
        msg
    }

    #[test]
    fn counts_received_messages() {
        let metrics = Metrics::new("test").unwrap();

        let timer = metrics.start(&query());
        timer.finish(&Message::reply_to(&query()));

        let mut skipped = query();
        skipped.set_opcode(OpCode::Update);
        let timer = metrics.start(&skipped);
        timer.finish(&Message::reply_to(&skipped));

        let text = metrics.gather().unwrap();
        assert!(text.contains("test_received_message_count{type=\"query\"} 1"), "{}", text);
        assert!(text.contains("test_received_message_count{type=\"another\"} 1"), "{}", text);
    }

    #[test]
    fn classifies_responses() {
        let metrics = Metrics::new("test").unwrap();

        // Empty answer: not-found.
        metrics.start(&query()).finish(&Message::reply_to(&query()));

        // Authoritative answer: local.
        let mut local = Message::reply_to(&query());
        local.set_authoritative(true);
        local.add_answer(ResourceRecord::new(
            "example.com.",
            RecordType::A,
            RecordClass::IN,
            10,
            RData::A(Ipv4Addr::LOCALHOST),
        ));
        metrics.start(&query()).finish(&local);

        // Non-authoritative answer: upstream.
        let mut upstream = local.clone();
        upstream.set_authoritative(false);
        metrics.start(&query()).finish(&upstream);

        let text = metrics.gather().unwrap();
        assert!(text.contains("test_resolve_count{source=\"not-found\",type=\"A\"} 1"), "{}", text);
        assert!(text.contains("test_resolve_count{source=\"local\",type=\"A\"} 1"), "{}", text);
        assert!(text.contains("test_resolve_count{source=\"upstream\",type=\"A\"} 1"), "{}", text);
    }

    #[test]
    fn counts_errors_and_cache() {
        let metrics = Metrics::new("test").unwrap();
        let req = Request::new(Domain::new("example.com.").unwrap(), RecordType::TXT, false);

        metrics.error(&req);
        metrics.cache_hit(&req);
        metrics.cache_miss(&req);
        metrics.cache_miss(&req);

        let text = metrics.gather().unwrap();
        assert!(text.contains("test_resolve_error_count{type=\"TXT\"} 1"), "{}", text);
        assert!(text.contains("test_cache_count{cache=\"hit\",type=\"TXT\"} 1"), "{}", text);
        assert!(text.contains("test_cache_count{cache=\"miss\",type=\"TXT\"} 2"), "{}", text);
    }

    #[test]
    fn observes_durations() {
        let metrics = Metrics::new("test").unwrap();
        metrics.upstream_time(Duration::from_millis(5));
        metrics.start(&query()).finish(&Message::reply_to(&query()));

        let text = metrics.gather().unwrap();
        assert!(text.contains("test_upstream_resolve_duration_seconds_count 1"), "{}", text);
        assert!(text.contains("test_resolve_duration_seconds_count 1"), "{}", text);
    }
}
