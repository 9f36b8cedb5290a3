//! Volatile records
//!
//! A [`VolatileRecord`] is a wire record paired with an optional absolute
//! expiration instant. The textual form appends `; <unix-seconds>` when the
//! record is volatile. Reading a record whose expiration has passed fails
//! with an expiration error, so stale entries can never leak out of a
//! store.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use crate::dns::ResourceRecord;
use crate::error::{Error, Result};
use crate::record::record::unix_seconds;
use crate::record::Record;

/// A record value with an optional expiration instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolatileRecord {
    /// The stored wire record. Its TTL is recomputed from `expire` on read.
    pub rr: ResourceRecord,
    /// Absolute expiration instant; `None` means non-volatile.
    pub expire: Option<SystemTime>,
}

impl VolatileRecord {
    /// Wrap a record with an optional expiration.
    pub fn new(record: &Record, expire: Option<SystemTime>) -> Self {
        VolatileRecord {
            rr: record.to_rr(),
            expire,
        }
    }

    /// Check whether the expiration instant has passed.
    pub fn is_expired(&self) -> bool {
        match self.expire {
            Some(expire) => expire <= SystemTime::now(),
            None => false,
        }
    }

    /// Get the record, with the TTL recomputed as the seconds remaining
    /// until expiration. Fails with an expiration error when expired.
    pub fn record(&self) -> Result<Record> {
        let mut rr = self.rr.clone();

        if let Some(expire) = self.expire {
            let left = expire
                .duration_since(SystemTime::now())
                .map_err(|_| {
                    Error::expiration(format!(
                        "this record is already expired: {}",
                        unix_seconds(expire)
                    ))
                })?;
            rr.set_ttl(left.as_secs_f64().round() as u32);
        }

        Record::from_rr(&rr)
    }

    /// Render to the textual form, `<record>` or `<record> ; <unix>`.
    /// Fails when the record is already expired.
    pub fn marshal(&self) -> Result<String> {
        let record = self.record()?;

        match self.expire {
            Some(expire) => Ok(format!("{} ; {}", record, unix_seconds(expire))),
            None => Ok(record.to_string()),
        }
    }
}

impl fmt::Display for VolatileRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.marshal().unwrap_or_default())
    }
}

impl FromStr for VolatileRecord {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        if text.contains('\n') {
            return Err(Error::argument("record can't have multi line"));
        }
        let text = text.trim();

        let (record_part, expire_part) = match text.split_once(';') {
            Some((r, e)) => (r, Some(e)),
            None => (text, None),
        };

        let record: Record = record_part.parse()?;

        let expire = match expire_part {
            Some(raw) => {
                let secs: i64 = raw
                    .trim()
                    .parse()
                    .map_err(|e| Error::argument_caused("failed to parse record", e))?;
                let expire = SystemTime::UNIX_EPOCH + Duration::from_secs(secs.max(0) as u64);
                if expire <= SystemTime::now() {
                    return Err(Error::expiration(format!(
                        "failed to parse record: expire can't be past time: {}",
                        secs
                    )));
                }
                Some(expire)
            }
            None => None,
        };

        Ok(VolatileRecord {
            rr: record.to_rr(),
            expire,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_volatile_roundtrip() {
        let vr: VolatileRecord = "example.com. 100 IN A 127.0.0.1".parse().unwrap();
        assert_eq!(vr.expire, None);
        assert!(!vr.is_expired());
        assert_eq!(vr.marshal().unwrap(), "example.com. 100 IN A 127.0.0.1");
    }

    #[test]
    fn volatile_parses_expire_suffix() {
        let expire = unix_seconds(SystemTime::now() + Duration::from_secs(100));
        let text = format!("example.com. 100 IN A 127.0.0.1 ; {}", expire);

        let vr: VolatileRecord = text.parse().unwrap();
        assert!(vr.expire.is_some());
        assert!(!vr.is_expired());

        // The remaining TTL is recomputed from the expire instant.
        let record = vr.record().unwrap();
        assert!((99..=101).contains(&record.ttl()));

        let rendered = vr.marshal().unwrap();
        assert!(rendered.ends_with(&format!("; {}", expire)));
    }

    #[test]
    fn past_expire_fails_to_parse() {
        let expire = unix_seconds(SystemTime::now() - Duration::from_secs(100));
        let text = format!("example.com. 100 IN A 127.0.0.1 ; {}", expire);

        let err = text.parse::<VolatileRecord>().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Expiration);
    }

    #[test]
    fn expired_record_fails_to_read() {
        let record: Record = "example.com. 100 IN A 127.0.0.1".parse().unwrap();
        let vr = VolatileRecord::new(&record, Some(SystemTime::now() - Duration::from_secs(1)));

        assert!(vr.is_expired());
        let err = vr.record().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Expiration);
    }

    #[test]
    fn multi_line_is_rejected() {
        assert!("example.com. 1 IN A 127.0.0.1\nexample.com. 1 IN A 127.0.0.2"
            .parse::<VolatileRecord>()
            .is_err());
    }
}
