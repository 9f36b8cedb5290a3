//! emberdns - a small authoritative-plus-recursive DNS server for home and
//! development use.
//!
//! The server answers queries from three kinds of sources composed into
//! one pipeline: a static zone loaded from YAML configuration, a dynamic
//! zone persisted in a database and mutable through a REST management API,
//! and a recursive upstream behind an optional response cache. Prometheus
//! metrics are exposed alongside the API.
//!
//! # Architecture
//!
//! - `dns`: the wire-facing message model and the RFC 1035 codec
//! - `record`: domains, zone-file records, dynamic and volatile records
//! - `resolver`: the resolver pipeline (static, dynamic, forward, cache)
//!   and its composition operators
//! - `handler`: the bridge from wire queries to the pipeline
//! - `api`: the REST management surface for the dynamic zone
//! - `metrics`: Prometheus counters and latency histograms
//! - `server`: UDP/TCP DNS listeners and the HTTP listener, composed
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use emberdns::metrics::Metrics;
//! use emberdns::resolver::{MergeResolver, Resolver, SqliteResolver};
//! use emberdns::server::Server;
//!
//! # async fn example() -> emberdns::Result<()> {
//! let metrics = Arc::new(Metrics::new("emberdns")?);
//! let dynamic = Arc::new(SqliteResolver::new(":memory:")?);
//! let resolver = Arc::new(MergeResolver::new(vec![
//!     Arc::clone(&dynamic) as Arc<dyn Resolver>,
//! ]));
//!
//! let server = Server {
//!     name: "emberdns".to_string(),
//!     metrics,
//!     dynamic_resolver: dynamic,
//!     resolver,
//! };
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod dns;
pub mod error;
pub mod handler;
pub mod logging;
pub mod metrics;
pub mod record;
pub mod resolver;
pub mod server;

pub use error::{Error, ErrorKind, Result};
