//! Remote response cache
//!
//! The cache variant backed by a remote store: one list of serialized
//! volatile records per (qtype, name) key, written transactionally with a
//! list expiration equal to the smallest answer TTL. The store only sees
//! opaque text; all record semantics stay in the engine.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{ErrorKind, Result};
use crate::metrics::Metrics;
use crate::record::VolatileRecord;
use crate::resolver::{Request, Resolver, ResponseWriter, ResponseWriterHook};

/// The consumed contract of a remote cache store.
///
/// `store` must behave transactionally: either the whole list is written
/// with its expiration attached, or nothing is.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch the whole list under a key; an unknown key is the empty list.
    async fn fetch(&self, key: &str) -> Result<Vec<String>>;

    /// Replace the list under a key, expiring it after `ttl` seconds.
    async fn store(&self, key: &str, values: &[String], ttl: u32) -> Result<()>;

    /// Release the connection.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Cache manager sharing its entries through a remote [`CacheStore`].
pub struct RemoteCache<S: CacheStore> {
    store: S,
    upstream: Arc<dyn Resolver>,
    metrics: Arc<Metrics>,
}

impl<S: CacheStore> RemoteCache<S> {
    /// Wrap `upstream` with a cache backed by `store`.
    pub fn new(store: S, upstream: Arc<dyn Resolver>, metrics: Arc<Metrics>) -> Self {
        RemoteCache {
            store,
            upstream,
            metrics,
        }
    }

    async fn resolve_from_upstream(
        &self,
        w: &mut dyn ResponseWriter,
        req: &Request,
        key: &str,
    ) -> Result<()> {
        self.metrics.cache_miss(req);

        let mut min_ttl = u32::MAX;
        let mut pending: Vec<String> = Vec::new();
        {
            let mut hook = ResponseWriterHook::new(&mut *w, |record| {
                min_ttl = min_ttl.min(record.ttl());

                // A zero TTL aborts the transaction below; serializing the
                // record would fail as already expired.
                if record.ttl() > 0 {
                    let expire = SystemTime::now() + Duration::from_secs(u64::from(record.ttl()));
                    pending.push(VolatileRecord::new(record, Some(expire)).marshal()?);
                }
                Ok(())
            });

            self.upstream.resolve(&mut hook, req).await?;
        }

        // An empty answer has nothing to store; a zero minimum TTL aborts
        // the transaction so the response is never replayed.
        if pending.is_empty() || min_ttl == 0 {
            return Ok(());
        }

        self.store.store(key, &pending, min_ttl).await
    }

    fn resolve_from_cache(
        &self,
        w: &mut dyn ResponseWriter,
        req: &Request,
        cached: Vec<String>,
    ) -> Result<()> {
        self.metrics.cache_hit(req);

        for text in cached {
            let entry: VolatileRecord = match text.parse() {
                Ok(entry) => entry,
                // The store may hand back members that outlived their own
                // expiration while the list as a whole survives.
                Err(err) if err.kind() == ErrorKind::Expiration => continue,
                Err(err) => return Err(err),
            };

            let record = match entry.record() {
                Ok(record) => record,
                Err(err) if err.kind() == ErrorKind::Expiration => continue,
                Err(err) => return Err(err),
            };

            w.set_no_authoritative();
            w.add(record)?;
        }

        Ok(())
    }
}

#[async_trait]
impl<S: CacheStore> Resolver for RemoteCache<S> {
    async fn resolve(&self, w: &mut dyn ResponseWriter, req: &Request) -> Result<()> {
        let key = format!("{}:{}", req.qtype, req.name);

        let cached = self.store.fetch(&key).await?;
        if cached.is_empty() {
            self.resolve_from_upstream(w, req, &key).await
        } else {
            self.resolve_from_cache(w, req, cached)
        }
    }

    fn recursion_available(&self) -> bool {
        self.upstream.recursion_available()
    }

    async fn close(&self) -> Result<()> {
        let store = self.store.close().await;
        self.upstream.close().await?;
        store
    }
}

impl<S: CacheStore> fmt::Display for RemoteCache<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RemoteCache[{}]", self.upstream)
    }
}

/// An in-memory [`CacheStore`] with list expiry, for tests.
#[derive(Default)]
pub struct MemoryCacheStore {
    lists: Mutex<HashMap<String, (Vec<String>, SystemTime)>>,
}

impl MemoryCacheStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn fetch(&self, key: &str) -> Result<Vec<String>> {
        let lists = self.lists.lock();
        Ok(lists
            .get(key)
            .filter(|(_, expire)| *expire > SystemTime::now())
            .map(|(values, _)| values.clone())
            .unwrap_or_default())
    }

    async fn store(&self, key: &str, values: &[String], ttl: u32) -> Result<()> {
        let expire = SystemTime::now() + Duration::from_secs(u64::from(ttl));
        self.lists
            .lock()
            .insert(key.to_string(), (values.to_vec(), expire));
        Ok(())
    }
}
