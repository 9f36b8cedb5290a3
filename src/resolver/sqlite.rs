//! Sqlite-backed dynamic resolver
//!
//! The default dynamic-zone engine: a single-file (or in-memory) sqlite
//! database holding one row per record, keyed by an auto-increment ID that
//! is never reused. One mutex guards the connection, which serializes
//! every public operation and the sweep tick, so an upsert and its
//! reverse-PTR twin are observed atomically by concurrent readers.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use tokio::sync::watch;
use tracing::warn;

use crate::error::{Error, Result};
use crate::record::record::unix_seconds;
use crate::record::{Domain, DynamicRecord, DynamicRecordSet, PtrRecord, Record};
use crate::resolver::dynamic::{compile_glob, no_such_record, DynamicResolver};
use crate::resolver::{Request, Resolver, ResponseWriter};

/// Default interval between sweeps of expired volatile records.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// A [`DynamicResolver`] persisting its records in sqlite.
pub struct SqliteResolver {
    path: String,
    conn: Arc<Mutex<Option<Connection>>>,
    closer: watch::Sender<bool>,
}

fn external(e: rusqlite::Error) -> Error {
    Error::external_caused("database error", e)
}

fn now_unix() -> i64 {
    unix_seconds(SystemTime::now())
}

impl SqliteResolver {
    /// Open (or create) the database at `path` and start the sweeper.
    /// `":memory:"` keeps the zone in memory only.
    ///
    /// The sweeper runs on the tokio runtime, so this must be called from
    /// within one. Callers must `close` the resolver to stop it.
    pub fn new(path: &str) -> Result<Self> {
        Self::with_sweep_interval(path, DEFAULT_SWEEP_INTERVAL)
    }

    /// Like [`SqliteResolver::new`] with a custom sweep interval.
    pub fn with_sweep_interval(path: &str, interval: Duration) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| Error::external_caused("failed to open sqlite database", e))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                qtype TEXT NOT NULL,
                ttl INTEGER NOT NULL,
                expire INTEGER NOT NULL,
                record TEXT UNIQUE
            );
            CREATE INDEX IF NOT EXISTS record_name ON records (name, qtype);",
        )
        .map_err(|e| Error::external_caused("failed to create table", e))?;

        let conn = Arc::new(Mutex::new(Some(conn)));
        let (closer, mut closed) = watch::channel(false);

        let sweep_conn = Arc::clone(&conn);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let guard = sweep_conn.lock();
                        let Some(conn) = guard.as_ref() else { return };
                        if let Err(e) = conn.execute(
                            "DELETE FROM records WHERE expire > 0 AND expire < ?1",
                            params![now_unix()],
                        ) {
                            warn!(reason = %e, "failed to delete expired records");
                        }
                    }
                    _ = closed.changed() => return,
                }
            }
        });

        Ok(SqliteResolver {
            path: path.to_string(),
            conn,
            closer,
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self.conn.lock();
        match guard.as_ref() {
            Some(conn) => f(conn),
            None => Err(Error::external("database is closed")),
        }
    }

    fn scan_rows(mut rows: rusqlite::Rows<'_>) -> Result<DynamicRecordSet> {
        let mut result = DynamicRecordSet::new();

        while let Some(row) = rows.next().map_err(external)? {
            let id: i64 = row.get(0).map_err(external)?;
            let ttl: u32 = row.get(1).map_err(external)?;
            let expire: i64 = row.get(2).map_err(external)?;
            let text: String = row.get(3).map_err(external)?;

            let (record, volatile) = if expire != 0 {
                let expire = SystemTime::UNIX_EPOCH + Duration::from_secs(expire.max(0) as u64);
                (Record::parse_with_expire(&text, expire)?, true)
            } else {
                (Record::parse_with_ttl(&text, ttl)?, false)
            };

            result.0.push(DynamicRecord {
                record,
                id: Some(id),
                volatile,
                disabled: false,
            });
        }

        Ok(result)
    }

    fn query_records(&self, condition: &str, args: &[&dyn rusqlite::ToSql]) -> Result<DynamicRecordSet> {
        let sql = format!(
            "SELECT id, ttl, expire, record FROM records
             WHERE {} AND (expire = 0 OR expire > {})
             ORDER BY id",
            condition,
            now_unix(),
        );

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql).map_err(external)?;
            let rows = stmt.query(args).map_err(external)?;
            Self::scan_rows(rows)
        })
    }
}

/// The reverse-PTR twin of an A/AAAA record, or `None` for anything else.
fn reverse_ptr(record: &DynamicRecord) -> Option<DynamicRecord> {
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

fn insert_record(tx: &rusqlite::Transaction<'_>, record: &DynamicRecord) -> Result<()> {
    let expire = if record.volatile {
        now_unix() + i64::from(record.record.ttl())
    } else {
        0
    };

    let updated = tx
        .execute(
            "UPDATE records SET ttl = ?1, expire = ?2 WHERE record = ?3",
            params![record.record.ttl(), expire, record.record.without_ttl()],
        )
        .map_err(|e| Error::external_caused("failed to update exists record", e))?;

    if updated == 0 {
        tx.execute(
            "INSERT INTO records (name, qtype, ttl, expire, record) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.record.name().as_str(),
                record.record.qtype().to_string(),
                record.record.ttl(),
                expire,
                record.record.without_ttl(),
            ],
        )
        .map_err(|e| Error::external_caused("failed to insert record", e))?;
    }

    if let Some(ptr) = reverse_ptr(record) {
        insert_record(tx, &ptr)?;
    }

    Ok(())
}

fn drop_record(tx: &rusqlite::Transaction<'_>, record: &DynamicRecord) -> Result<()> {
    match record.id {
        Some(id) => tx.execute(
            "DELETE FROM records WHERE id = ?1 AND ttl = ?2 AND record = ?3",
            params![id, record.record.ttl(), record.record.without_ttl()],
        ),
        None => tx.execute(
            "DELETE FROM records WHERE ttl = ?1 AND record = ?2",
            params![record.record.ttl(), record.record.without_ttl()],
        ),
    }
    .map_err(|e| Error::external_caused("failed to drop record", e))?;

    if let Some(ptr) = reverse_ptr(record) {
        drop_record(tx, &ptr)?;
    }

    Ok(())
}

#[async_trait]
impl DynamicResolver for SqliteResolver {
    async fn set_records(&self, records: DynamicRecordSet) -> Result<()> {
        let mut guard = self.conn.lock();
        let conn = guard
            .as_mut()
            .ok_or_else(|| Error::external("database is closed"))?;

        let tx = conn
            .transaction()
            .map_err(|e| Error::external_caused("failed to begin transaction", e))?;

        for record in &records {
            if record.disabled {
                drop_record(&tx, record)?;
            } else {
                insert_record(&tx, record)?;
            }
        }

        tx.commit()
            .map_err(|e| Error::external_caused("failed to commit transaction", e))
    }

    async fn records(&self) -> Result<DynamicRecordSet> {
        self.query_records("1=1", &[])
    }

    async fn search_records(&self, suffix: &Domain) -> Result<DynamicRecordSet> {
        let exact = suffix.as_str().to_string();
        let like = format!("%.{}", escape_like(suffix.as_str()));

        self.query_records(
            "(name = ?1 OR name LIKE ?2 ESCAPE '\\')",
            &[&exact, &like],
        )
    }

    async fn glob_records(&self, pattern: &str) -> Result<DynamicRecordSet> {
        // Validate the pattern the same way the engine-side matcher does,
        // then translate it to a LIKE expression for the index. A star
        // must consume at least one byte, hence `_%`.
        compile_glob(pattern)?;
        let like = escape_like(pattern).replace('*', "_%");

        self.query_records("name LIKE ?1 ESCAPE '\\'", &[&like])
    }

    async fn get_record(&self, id: i64) -> Result<DynamicRecordSet> {
        self.query_records("id = ?1", &[&id])
    }

    async fn remove_record(&self, id: i64) -> Result<()> {
        self.with_conn(|conn| {
            let affected = conn
                .execute("DELETE FROM records WHERE id = ?1", params![id])
                .map_err(external)?;

            if affected == 0 {
                return Err(no_such_record());
            }
            Ok(())
        })
    }
}

fn escape_like(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[async_trait]
impl Resolver for SqliteResolver {
    async fn resolve(&self, w: &mut dyn ResponseWriter, req: &Request) -> Result<()> {
        let records = self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT record, ttl, expire FROM records
                     WHERE name = ?1 AND qtype = ?2
                     AND (expire = 0 OR expire > ?3)",
                )
                .map_err(external)?;

            let mut rows = stmt
                .query(params![req.name.as_str(), req.qtype.to_string(), now_unix()])
                .map_err(external)?;

            let mut records = Vec::new();
            while let Some(row) = rows.next().map_err(external)? {
                let text: String = row.get(0).map_err(external)?;
                let ttl: u32 = row.get(1).map_err(external)?;
                let expire: i64 = row.get(2).map_err(external)?;

                let record = if expire != 0 {
                    let expire = SystemTime::UNIX_EPOCH + Duration::from_secs(expire.max(0) as u64);
                    Record::parse_with_expire(&text, expire)?
                } else {
                    Record::parse_with_ttl(&text, ttl)?
                };
                records.push(record);
            }
            Ok(records)
        })?;

        for record in records {
            w.add(record)?;
        }

        Ok(())
    }

    fn recursion_available(&self) -> bool {
        false
    }

    async fn close(&self) -> Result<()> {
        let _ = self.closer.send(true);
        self.conn.lock().take();
        Ok(())
    }
}

impl fmt::Display for SqliteResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SqliteResolver[{}]", self.path)
    }
}
