//! Ordered-KV dynamic resolver
//!
//! A dynamic-zone engine over a remote ordered key-value store. Unlike the
//! sqlite engine, the store only offers get/put/delete/list, so the engine
//! manages the ID counter itself under a sibling key and encodes records
//! in their volatile text form:
//!
//! ```text
//! <prefix>/records<reversed-domain-path>/<id>   -> volatile-record text
//! <prefix>/lastID                               -> last issued id
//! ```
//!
//! Volatile entries additionally attach a TTL lease provided by the store.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Error, ErrorKind, Result};
use crate::record::{Domain, DynamicRecord, DynamicRecordSet, PtrRecord, Record, VolatileRecord};
use crate::resolver::dynamic::{compile_glob, no_such_record, DynamicResolver};
use crate::resolver::{Request, Resolver, ResponseWriter};

/// The consumed contract of a remote ordered key-value store.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Get the value under a key.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value. When `lease_ttl` is set the entry disappears after
    /// that many seconds.
    async fn put(&self, key: &str, value: &str, lease_ttl: Option<u32>) -> Result<()>;

    /// Delete a key; reports whether it existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// List all entries whose key starts with `prefix`, in key order.
    async fn list(&self, prefix: &str) -> Result<Vec<(String, String)>>;

    /// Release the connection.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// A [`DynamicResolver`] over any [`KvStore`].
pub struct KvResolver<S: KvStore> {
    store: S,
    prefix: String,
}

impl<S: KvStore> KvResolver<S> {
    /// Wrap a store, keeping every key under `prefix`.
    pub fn new(store: S, prefix: &str) -> Self {
        KvResolver {
            store,
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    fn name_key(&self, name: &Domain) -> String {
        format!("{}/records{}", self.prefix, name.to_path())
    }

    fn record_key(&self, name: &Domain, id: i64) -> String {
        format!("{}/{}", self.name_key(name), id)
    }

    fn last_id_key(&self) -> String {
        format!("{}/lastID", self.prefix)
    }

    fn id_from_key(key: &str) -> Result<i64> {
        key.rsplit('/')
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| Error::internal(format!("failed to parse record ID: {}", key)))
    }

    /// Issue a fresh ID: read the sibling counter, increment, write back.
    async fn next_id(&self) -> Result<i64> {
        let id = match self.store.get(&self.last_id_key()).await? {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .map_err(|e| Error::internal_caused("failed to parse last ID", e))?,
            None => 0,
        } + 1;

        self.store
            .put(&self.last_id_key(), &id.to_string(), None)
            .await?;

        Ok(id)
    }

    /// Find the stored entry matching this record, by full text when
    /// `with_ttl` or by TTL-masked form otherwise.
    async fn find_key(&self, record: &DynamicRecord, with_ttl: bool) -> Result<Option<(i64, String)>> {
        for (key, value) in self.store.list(&self.name_key(record.record.name())).await? {
            let stored: VolatileRecord = value.parse()?;
            let rec = stored.record()?;

            let matched = if with_ttl {
                record.record.to_string() == rec.to_string()
            } else {
                record.record.without_ttl() == rec.without_ttl()
            };
            if !matched {
                continue;
            }

            return Ok(Some((Self::id_from_key(&key)?, key)));
        }

        Ok(None)
    }

    async fn insert_single(&self, record: &DynamicRecord) -> Result<()> {
        let key = match self.find_key(record, false).await? {
            Some((_, key)) => key,
            None => {
                let id = self.next_id().await?;
                self.record_key(record.record.name(), id)
            }
        };

        let lease = record.volatile.then(|| record.record.ttl());
        let value = record.volatile_record().marshal()?;

        self.store.put(&key, &value, lease).await
    }

    async fn insert_record(&self, record: &DynamicRecord) -> Result<()> {
        self.insert_single(record).await?;

        if let Some(ptr) = reverse_twin(record) {
            self.insert_single(&ptr).await?;
        }
        Ok(())
    }

    fn drop_record<'a>(
        &'a self,
        record: &'a DynamicRecord,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            if let Some((_, key)) = self.find_key(record, true).await? {
                self.store.delete(&key).await?;
            }

            if let Some(ptr) = reverse_twin(record) {
                self.drop_record(&ptr).await?;
            }
            Ok(())
        })
    }

    async fn read_range(&self, prefix: &str) -> Result<DynamicRecordSet> {
        let mut records = Vec::new();

        for (key, value) in self.store.list(prefix).await? {
            let stored = match value.parse::<VolatileRecord>() {
                Ok(stored) => stored,
                // A leased entry may outlive its expiration between
                // sweeps of the store.
                Err(err) if err.kind() == ErrorKind::Expiration => continue,
                Err(err) => return Err(err),
            };

            records.push(DynamicRecord {
                record: stored.record()?,
                id: Some(Self::id_from_key(&key)?),
                volatile: stored.expire.is_some(),
                disabled: false,
            });
        }

        records.sort_by_key(|r| r.id);
        Ok(DynamicRecordSet(records))
    }
}

fn reverse_twin(record: &DynamicRecord) -> Option<DynamicRecord> {
    let Record::Address(addr) = &record.record else {
        return None;
    };

    Some(DynamicRecord {
        record: Record::Ptr(PtrRecord {
            name: Domain::reverse(addr.address),
            ttl: addr.ttl,
            domain: addr.name.clone(),
        }),
        id: None,
        volatile: record.volatile,
        disabled: record.disabled,
    })
}

#[async_trait]
impl<S: KvStore> DynamicResolver for KvResolver<S> {
    async fn set_records(&self, records: DynamicRecordSet) -> Result<()> {
        for record in &records {
            if record.disabled {
                self.drop_record(record).await?;
            } else {
                self.insert_record(record).await?;
            }
        }
        Ok(())
    }

    async fn records(&self) -> Result<DynamicRecordSet> {
        self.read_range(&format!("{}/records/", self.prefix)).await
    }

    async fn search_records(&self, suffix: &Domain) -> Result<DynamicRecordSet> {
        let range = self.read_range(&self.name_key(suffix)).await?;

        // The key prefix can catch sibling labels that merely share a
        // string prefix, so re-check label alignment.
        let records = range
            .into_iter()
            .filter(|r| r.record.name().has_suffix(suffix))
            .collect();
        Ok(DynamicRecordSet(records))
    }

    async fn glob_records(&self, pattern: &str) -> Result<DynamicRecordSet> {
        let matcher = compile_glob(pattern)?;

        let records = self
            .records()
            .await?
            .into_iter()
            .filter(|r| matcher.is_match(r.record.name().as_str()))
            .collect();
        Ok(DynamicRecordSet(records))
    }

    async fn get_record(&self, id: i64) -> Result<DynamicRecordSet> {
        let records = self
            .records()
            .await?
            .into_iter()
            .filter(|r| r.id == Some(id))
            .collect();
        Ok(DynamicRecordSet(records))
    }

    async fn remove_record(&self, id: i64) -> Result<()> {
        for record in self.records().await? {
            if record.id == Some(id) {
                self.store
                    .delete(&self.record_key(record.record.name(), id))
                    .await?;
                return Ok(());
            }
        }
        Err(no_such_record())
    }
}

#[async_trait]
impl<S: KvStore> Resolver for KvResolver<S> {
    async fn resolve(&self, w: &mut dyn ResponseWriter, req: &Request) -> Result<()> {
        for record in self.search_records(&req.name).await? {
            if record.record.name() == &req.name && record.record.qtype() == req.qtype {
                w.add(record.record)?;
            }
        }
        Ok(())
    }

    fn recursion_available(&self) -> bool {
        false
    }

    async fn close(&self) -> Result<()> {
        self.store.close().await
    }
}

impl<S: KvStore> fmt::Display for KvResolver<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KvResolver[{}]", self.prefix)
    }
}

/// An in-memory [`KvStore`] with lease expiry, for tests and ephemeral
/// zones.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: Mutex<BTreeMap<String, (String, Option<SystemTime>)>>,
}

impl MemoryKvStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn live(expire: &Option<SystemTime>) -> bool {
    match expire {
        Some(at) => *at > SystemTime::now(),
        None => true,
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock();
        Ok(entries
            .get(key)
            .filter(|(_, expire)| live(expire))
            .map(|(value, _)| value.clone()))
    }

    async fn put(&self, key: &str, value: &str, lease_ttl: Option<u32>) -> Result<()> {
        let expire = lease_ttl.map(|ttl| SystemTime::now() + Duration::from_secs(u64::from(ttl)));
        self.entries
            .lock()
            .insert(key.to_string(), (value.to_string(), expire));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.lock().remove(key).is_some())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let entries = self.entries.lock();
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .filter(|(_, (_, expire))| live(expire))
            .map(|(key, (value, _))| (key.clone(), value.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::RecordType;
    use crate::resolver::ResponseCallback;

    fn resolver() -> KvResolver<MemoryKvStore> {
        KvResolver::new(MemoryKvStore::new(), "/emberdns")
    }

    async fn set(resolver: &KvResolver<MemoryKvStore>, text: &str) -> Result<()> {
        resolver.set_records(text.parse().unwrap()).await
    }

    #[tokio::test]
    async fn upsert_allocates_increasing_ids_and_ptr() {
        let resolver = resolver();

        set(&resolver, "example.com. 100 IN A 127.0.0.2").await.unwrap();

        let records = resolver.records().await.unwrap();
        assert_eq!(
            records.to_string(),
            "example.com. 100 IN A 127.0.0.2 ; ID:1\n\
             2.0.0.127.in-addr.arpa. 100 IN PTR example.com. ; ID:2\n"
        );

        // The ID counter lives under the sibling key.
        assert_eq!(
            resolver.store.get("/emberdns/lastID").await.unwrap(),
            Some("2".to_string())
        );
    }

    #[tokio::test]
    async fn reassert_keeps_id_and_counter() {
        let resolver = resolver();

        set(&resolver, "example.com. 100 IN TXT \"x\"").await.unwrap();
        set(&resolver, "example.com. 50 IN TXT \"x\"").await.unwrap();

        let records = resolver.records().await.unwrap();
        assert_eq!(records.to_string(), "example.com. 50 IN TXT \"x\" ; ID:1\n");
        assert_eq!(
            resolver.store.get("/emberdns/lastID").await.unwrap(),
            Some("1".to_string())
        );
    }

    #[tokio::test]
    async fn disabled_removes_record_and_ptr() {
        let resolver = resolver();

        set(&resolver, "example.com. 100 IN A 127.0.0.2").await.unwrap();
        set(&resolver, ";example.com. 100 IN A 127.0.0.2").await.unwrap();

        assert!(resolver.records().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_is_label_aligned_over_key_paths() {
        let resolver = resolver();

        set(
            &resolver,
            "example.com. 10 IN TXT \"1\"\nwww.example.com. 10 IN TXT \"2\"\nexample.org. 10 IN TXT \"3\"",
        )
        .await
        .unwrap();

        let found = resolver
            .search_records(&Domain::new("example.com.").unwrap())
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        for record in &found {
            assert!(record.record.name().as_str().ends_with("example.com."));
        }
    }

    #[tokio::test]
    async fn glob_get_remove() {
        let resolver = resolver();

        set(&resolver, "example.com. 10 IN TXT \"1\"\nple.com. 10 IN TXT \"2\"")
            .await
            .unwrap();

        let found = resolver.glob_records("*ple.com.").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found.0[0].record.name().as_str(), "example.com.");

        let found = resolver.get_record(1).await.unwrap();
        assert_eq!(found.len(), 1);

        resolver.remove_record(1).await.unwrap();
        assert_eq!(resolver.remove_record(1).await.unwrap_err(), no_such_record());
    }

    #[tokio::test]
    async fn volatile_records_carry_a_lease() {
        let resolver = resolver();

        set(&resolver, "example.com. 100 IN TXT \"v\" ; Volatile").await.unwrap();

        let records = resolver.records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records.0[0].volatile);
    }

    #[tokio::test]
    async fn resolve_filters_name_and_qtype() {
        let resolver = resolver();

        set(
            &resolver,
            "example.com. 10 IN A 127.0.0.1\nexample.com. 10 IN TXT \"x\"\nwww.example.com. 10 IN A 127.0.0.9",
        )
        .await
        .unwrap();

        let mut records = Vec::new();
        let mut writer = ResponseCallback::new(|r| {
            records.push(r.to_string());
            Ok(())
        });
        let req = Request::new(Domain::new("example.com.").unwrap(), RecordType::A, false);
        resolver.resolve(&mut writer, &req).await.unwrap();
        drop(writer);

        assert_eq!(records, vec!["example.com. 10 IN A 127.0.0.1"]);
    }
}
