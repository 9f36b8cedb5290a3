//! Record resolvers
//!
//! The [`Resolver`] trait and its implementations: the in-memory static
//! zone, the persistent dynamic zone, the recursive forwarder, the caches,
//! and the two composition operators that stitch them into one pipeline.

use std::fmt;

use async_trait::async_trait;

use crate::dns::{RecordClass, RecordType};
use crate::error::Result;
use crate::record::Domain;

pub mod cache;
pub mod compose;
pub mod dynamic;
pub mod forward;
pub mod kv;
pub mod remote_cache;
pub mod sqlite;
pub mod static_zone;
pub mod writer;

pub use cache::LocalCache;
pub use compose::{FirstResolver, MergeResolver};
pub use dynamic::{no_such_record, DynamicResolver};
pub use forward::ForwardResolver;
pub use kv::{KvResolver, KvStore, MemoryKvStore};
pub use remote_cache::{CacheStore, MemoryCacheStore, RemoteCache};
pub use sqlite::SqliteResolver;
pub use static_zone::{StaticResolver, ZoneConfig};
pub use writer::{MessageBuilder, ResponseCallback, ResponseWriter, ResponseWriterHook};

/// One DNS question as the resolvers see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// The queried name.
    pub name: Domain,
    /// The queried record type.
    pub qtype: RecordType,
    /// The queried record class.
    pub qclass: RecordClass,
    /// Whether the client asked for recursion.
    pub recursion_desired: bool,
}

impl Request {
    /// Create a new request for the IN class.
    pub fn new(name: Domain, qtype: RecordType, recursion_desired: bool) -> Self {
        Request {
            name,
            qtype,
            qclass: RecordClass::IN,
            recursion_desired,
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ";{} {} {}", self.name, self.qclass, self.qtype)
    }
}

/// The interface of record resolvers.
///
/// A resolver writes whatever records it has for a request into the given
/// [`ResponseWriter`]; writing nothing is a valid answer. `close` releases
/// background tasks and backends; composed resolvers propagate it to their
/// children.
#[async_trait]
pub trait Resolver: Send + Sync + fmt::Display {
    /// Resolve a request, writing matching records into `w`.
    async fn resolve(&self, w: &mut dyn ResponseWriter, req: &Request) -> Result<()>;

    /// Check whether recursive resolution is available.
    fn recursion_available(&self) -> bool;

    /// Release background tasks and backends.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_display() {
        let req = Request::new(Domain::new("example.com.").unwrap(), RecordType::A, true);
        assert_eq!(req.to_string(), ";example.com. IN A");
    }
}
