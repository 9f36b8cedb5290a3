//! In-memory response cache
//!
//! Wraps any upstream resolver with a per-(qtype, name) cache of volatile
//! records. One mutex is held across the entire resolve, including the
//! upstream call: concurrent misses for the same instance serialize, so at
//! most one upstream call is in flight at a time and there is no
//! thundering herd. A background sweeper wakes on the nearest expiration,
//! on every insert, or on close, and drops entries whose earliest member
//! has expired.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::debug;

use crate::dns::RecordType;
use crate::error::Result;
use crate::metrics::Metrics;
use crate::record::{Domain, VolatileRecord};
use crate::resolver::{Request, Resolver, ResponseWriter, ResponseWriterHook};

/// Upper bound on how long the sweeper sleeps between passes.
const MAX_SWEEP_PAUSE: Duration = Duration::from_secs(10);

type Entries = HashMap<(RecordType, Domain), Vec<VolatileRecord>>;

/// In-memory cache manager for a [`Resolver`].
///
/// The cache starts a background sweeper, so callers must `close` it.
pub struct LocalCache {
    entries: Arc<Mutex<Entries>>,
    invoke: mpsc::Sender<()>,
    closer: watch::Sender<bool>,
    upstream: Arc<dyn Resolver>,
    metrics: Arc<Metrics>,
}

impl LocalCache {
    /// Wrap `upstream` with a cache and start the sweeper.
    pub fn new(upstream: Arc<dyn Resolver>, metrics: Arc<Metrics>) -> Self {
        let entries: Arc<Mutex<Entries>> = Arc::new(Mutex::new(HashMap::new()));
        // The invalidation signal coalesces: a full channel means a sweep
        // is already pending.
        let (invoke, mut invoked) = mpsc::channel(1);
        let (closer, mut closed) = watch::channel(false);

        let sweep_entries = Arc::clone(&entries);
        tokio::spawn(async move {
            loop {
                let next = Self::sweep(&sweep_entries).await;

                tokio::select! {
                    _ = tokio::time::sleep(next) => {}
                    received = invoked.recv() => {
                        if received.is_none() {
                            return;
                        }
                    }
                    _ = closed.changed() => return,
                }
            }
        });

        LocalCache {
            entries,
            invoke,
            closer,
            upstream,
            metrics,
        }
    }

    /// Drop entries with an expired member and report how long the sweeper
    /// may sleep until the next expiration.
    async fn sweep(entries: &Mutex<Entries>) -> Duration {
        let mut next = MAX_SWEEP_PAUSE;
        let now = SystemTime::now();

        let mut entries = entries.lock().await;
        entries.retain(|_, records| {
            for record in records.iter() {
                let Some(at) = record.expire else { continue };
                match at.duration_since(now) {
                    Ok(left) => next = next.min(left),
                    Err(_) => return false,
                }
            }
            true
        });

        next
    }

    async fn resolve_from_upstream(
        &self,
        entries: &mut Entries,
        w: &mut dyn ResponseWriter,
        req: &Request,
    ) -> Result<()> {
        self.metrics.cache_miss(req);

        let mut pending: Vec<VolatileRecord> = Vec::new();
        {
            let mut hook = ResponseWriterHook::new(&mut *w, |record| {
                // Records with no TTL left are forwarded but never cached.
                if record.ttl() > 0 {
                    let expire = SystemTime::now() + Duration::from_secs(u64::from(record.ttl()));
                    pending.push(VolatileRecord::new(record, Some(expire)));
                }
                Ok(())
            });

            self.upstream.resolve(&mut hook, req).await?;
        }

        if !pending.is_empty() {
            entries.insert((req.qtype, req.name.clone()), pending);
            // Non-blocking: losing the signal only delays the sweep.
            let _ = self.invoke.try_send(());
        }

        Ok(())
    }

    fn resolve_from_cache(
        &self,
        records: &[VolatileRecord],
        w: &mut dyn ResponseWriter,
        req: &Request,
    ) -> Result<()> {
        self.metrics.cache_hit(req);

        w.set_no_authoritative();
        for cached in records {
            w.add(cached.record()?)?;
        }

        Ok(())
    }
}

#[async_trait]
impl Resolver for LocalCache {
    async fn resolve(&self, w: &mut dyn ResponseWriter, req: &Request) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let key = (req.qtype, req.name.clone());

        match entries.get(&key) {
            Some(records) if records.iter().all(|r| !r.is_expired()) => {
                let records = records.clone();
                self.resolve_from_cache(&records, w, req)
            }
            Some(_) => {
                debug!(name = %req.name, "dropping expired cache entry");
                entries.remove(&key);
                self.resolve_from_upstream(&mut entries, w, req).await
            }
            None => self.resolve_from_upstream(&mut entries, w, req).await,
        }
    }

    fn recursion_available(&self) -> bool {
        self.upstream.recursion_available()
    }

    async fn close(&self) -> Result<()> {
        let _ = self.closer.send(true);
        self.upstream.close().await
    }
}

impl fmt::Display for LocalCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LocalCache[{}]", self.upstream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::RecordType;
    use crate::record::Record;
    use crate::resolver::{ResponseCallback, StaticResolver};

    fn metrics() -> Arc<Metrics> {
        Arc::new(Metrics::new("cache_test").unwrap())
    }

    fn upstream(lines: &[&str]) -> Arc<dyn Resolver> {
        let records: Vec<Record> = lines.iter().map(|l| l.parse().unwrap()).collect();
        Arc::new(StaticResolver::new(records))
    }

    fn request(name: &str) -> Request {
        Request::new(Domain::new(name).unwrap(), RecordType::A, false)
    }

    async fn resolve_collect(cache: &LocalCache, req: &Request) -> (Vec<String>, bool) {
        let mut records = Vec::new();
        let authoritative;
        {
            let mut writer = ResponseCallback::new(|r| {
                records.push(r.to_string());
                Ok(())
            });
            cache.resolve(&mut writer, req).await.unwrap();
            authoritative = writer.is_authoritative();
        }
        (records, authoritative)
    }

    #[tokio::test]
    async fn miss_then_hit() {
        let metrics = metrics();
        let cache = LocalCache::new(upstream(&["example.com. 10 IN A 127.2.3.4"]), metrics.clone());

        // First query goes upstream and keeps its authority.
        let (records, authoritative) = resolve_collect(&cache, &request("example.com.")).await;
        assert_eq!(records, vec!["example.com. 10 IN A 127.2.3.4"]);
        assert!(authoritative);

        // Second query is served from the cache, non-authoritative, with
        // the TTL counted down from the expiration instant.
        let (records, authoritative) = resolve_collect(&cache, &request("example.com.")).await;
        assert_eq!(records.len(), 1);
        assert!(records[0].starts_with("example.com. "));
        assert!(!authoritative);

        let text = metrics.gather().unwrap();
        assert!(text.contains("cache_test_cache_count{cache=\"miss\",type=\"A\"} 1"), "{}", text);
        assert!(text.contains("cache_test_cache_count{cache=\"hit\",type=\"A\"} 1"), "{}", text);

        cache.close().await.unwrap();
    }

    #[tokio::test]
    async fn zero_ttl_records_are_not_cached() {
        let metrics = metrics();
        let cache = LocalCache::new(upstream(&["example.com. 0 IN A 127.0.0.1"]), metrics.clone());

        resolve_collect(&cache, &request("example.com.")).await;
        resolve_collect(&cache, &request("example.com.")).await;

        // Both lookups miss: nothing was cached.
        let text = metrics.gather().unwrap();
        assert!(text.contains("cache_test_cache_count{cache=\"miss\",type=\"A\"} 2"), "{}", text);

        cache.close().await.unwrap();
    }

    #[tokio::test]
    async fn empty_answers_are_not_cached() {
        let metrics = metrics();
        let cache = LocalCache::new(upstream(&[]), metrics.clone());

        resolve_collect(&cache, &request("example.com.")).await;
        resolve_collect(&cache, &request("example.com.")).await;

        let text = metrics.gather().unwrap();
        assert!(text.contains("cache_test_cache_count{cache=\"miss\",type=\"A\"} 2"), "{}", text);

        cache.close().await.unwrap();
    }

    #[tokio::test]
    async fn expired_entries_fall_through_to_upstream() {
        let metrics = metrics();
        let cache = LocalCache::new(upstream(&["example.com. 1 IN A 127.0.0.1"]), metrics.clone());

        resolve_collect(&cache, &request("example.com.")).await;
        tokio::time::sleep(Duration::from_millis(1100)).await;

        let (records, _) = resolve_collect(&cache, &request("example.com.")).await;
        assert_eq!(records, vec!["example.com. 1 IN A 127.0.0.1"]);

        let text = metrics.gather().unwrap();
        assert!(text.contains("cache_test_cache_count{cache=\"miss\",type=\"A\"} 2"), "{}", text);

        cache.close().await.unwrap();
    }

    #[tokio::test]
    async fn sweeper_removes_expired_entries() {
        let metrics = metrics();
        let cache = LocalCache::new(upstream(&["example.com. 1 IN A 127.0.0.1"]), metrics);

        resolve_collect(&cache, &request("example.com.")).await;
        assert_eq!(cache.entries.lock().await.len(), 1);

        tokio::time::sleep(Duration::from_millis(1300)).await;
        assert!(cache.entries.lock().await.is_empty());

        cache.close().await.unwrap();
    }

    #[tokio::test]
    async fn recursion_available_follows_upstream() {
        let cache = LocalCache::new(upstream(&[]), metrics());
        assert!(!cache.recursion_available());
        cache.close().await.unwrap();
    }
}
