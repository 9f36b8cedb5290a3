//! Dynamic records and record sets
//!
//! A [`DynamicRecord`] wraps a record with the annotations the dynamic
//! zone understands: an engine-assigned ID, a volatile flag, and a
//! disabled flag. The textual form is
//!
//! ```text
//! [;]<record text>[ ; [ID:<n>] [Volatile]]
//! ```
//!
//! where a leading `;` marks the record disabled. A disabled record in a
//! submission instructs the engine to remove it. [`DynamicRecordSet`]
//! parses multi-line submissions, aggregating one error per bad line.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use crate::error::{Error, ErrorSet, Result};
use crate::record::{Record, VolatileRecord};

fn invalid_format() -> Error {
    Error::argument("invalid dynamic record format")
}

/// A record plus its dynamic-zone annotations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicRecord {
    pub record: Record,
    /// Engine-assigned ID; `None` until the record has been stored.
    pub id: Option<i64>,
    /// Volatile records expire one TTL after their last assertion.
    pub volatile: bool,
    /// A disabled record in a submission means *remove this record*.
    pub disabled: bool,
}

impl DynamicRecord {
    /// Wrap a plain record with no annotations.
    pub fn new(record: Record) -> Self {
        DynamicRecord {
            record,
            id: None,
            volatile: false,
            disabled: false,
        }
    }

    /// Make the volatile-record form. Volatile records get an expiration
    /// one TTL from now; others carry none.
    pub fn volatile_record(&self) -> VolatileRecord {
        let expire = self
            .volatile
            .then(|| SystemTime::now() + Duration::from_secs(u64::from(self.record.ttl())));
        VolatileRecord::new(&self.record, expire)
    }

    fn parse_annotations(&mut self, text: &str) -> Result<()> {
        self.id = None;
        self.volatile = false;

        for token in text.trim().split(' ') {
            let (key, value) = match token.split_once(':') {
                Some((k, v)) => (k, Some(v)),
                None => (token, None),
            };

            match key.trim().to_ascii_uppercase().as_str() {
                "ID" => {
                    let value = value.ok_or_else(invalid_format)?;
                    self.id = Some(value.trim().parse().map_err(|_| invalid_format())?);
                }
                "VOLATILE" => {
                    if value.is_some() {
                        return Err(invalid_format());
                    }
                    self.volatile = true;
                }
                _ => {}
            }
        }

        Ok(())
    }
}

impl fmt::Display for DynamicRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut annotations = Vec::new();
        if let Some(id) = self.id {
            annotations.push(format!("ID:{}", id));
        }
        if self.volatile {
            annotations.push("Volatile".to_string());
        }

        if self.disabled {
            write!(f, ";")?;
        }
        write!(f, "{}", self.record)?;
        if !annotations.is_empty() {
            write!(f, " ; {}", annotations.join(" "))?;
        }
        Ok(())
    }
}

impl FromStr for DynamicRecord {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        if text.contains('\n') {
            return Err(Error::argument("dynamic record can't have multi line"));
        }

        let mut text = text.trim();
        let disabled = text.starts_with(';');
        if disabled {
            text = text.trim_start_matches(';').trim_start();
        }

        let (record_part, annotation_part) = match text.split_once(';') {
            Some((r, a)) => (r, Some(a)),
            None => (text, None),
        };

        let mut record = DynamicRecord {
            record: record_part.parse()?,
            id: None,
            volatile: false,
            disabled,
        };

        if let Some(annotations) = annotation_part {
            record.parse_annotations(annotations)?;
        }

        Ok(record)
    }
}

/// An ordered list of dynamic records parsed from a multi-line submission.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DynamicRecordSet(pub Vec<DynamicRecord>);

impl DynamicRecordSet {
    /// Create an empty set.
    pub fn new() -> Self {
        DynamicRecordSet(Vec::new())
    }

    /// Number of records in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check whether the set has no records.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate the records in order.
    pub fn iter(&self) -> std::slice::Iter<'_, DynamicRecord> {
        self.0.iter()
    }
}

impl IntoIterator for DynamicRecordSet {
    type Item = DynamicRecord;
    type IntoIter = std::vec::IntoIter<DynamicRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a DynamicRecordSet {
    type Item = &'a DynamicRecord;
    type IntoIter = std::slice::Iter<'a, DynamicRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for DynamicRecordSet {
    /// One record per line, each line terminated by `\n`; the empty set
    /// renders as the empty string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for record in &self.0 {
            writeln!(f, "{}", record)?;
        }
        Ok(())
    }
}

impl FromStr for DynamicRecordSet {
    type Err = Error;

    /// Parse a multi-line submission. Blank lines are skipped,
    /// comment-only lines (a `;` prefix that does not parse as a record)
    /// are dropped, and parse failures are aggregated per line so the
    /// whole batch either parses or fails together.
    fn from_str(text: &str) -> Result<Self> {
        let mut records = Vec::new();
        let mut errors = ErrorSet::new();

        for (index, line) in text.split('\n').enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match line.parse::<DynamicRecord>() {
                Ok(record) => records.push(record),
                Err(_) if line.starts_with(';') => continue,
                Err(_) => errors.push(Error::argument(format!(
                    "line {}: invalid format: {}",
                    index + 1,
                    line
                ))),
            }
        }

        errors.into_result()?;
        Ok(DynamicRecordSet(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_record() {
        let r: DynamicRecord = "example.com. 100 IN A 127.0.0.2".parse().unwrap();
        assert_eq!(r.id, None);
        assert!(!r.volatile);
        assert!(!r.disabled);
        assert_eq!(r.to_string(), "example.com. 100 IN A 127.0.0.2");
    }

    #[test]
    fn parse_annotations() {
        let r: DynamicRecord = "example.com. 100 IN A 127.0.0.2 ; ID:42 Volatile"
            .parse()
            .unwrap();
        assert_eq!(r.id, Some(42));
        assert!(r.volatile);
        assert_eq!(
            r.to_string(),
            "example.com. 100 IN A 127.0.0.2 ; ID:42 Volatile"
        );
    }

    #[test]
    fn annotations_are_case_insensitive() {
        let r: DynamicRecord = "example.com. 100 IN A 127.0.0.2 ; id:1 vOlAtIlE"
            .parse()
            .unwrap();
        assert_eq!(r.id, Some(1));
        assert!(r.volatile);
    }

    #[test]
    fn unknown_annotations_are_ignored() {
        let r: DynamicRecord = "example.com. 100 IN A 127.0.0.2 ; ID:3 Whatever"
            .parse()
            .unwrap();
        assert_eq!(r.id, Some(3));
        assert!(!r.volatile);
    }

    #[test]
    fn malformed_id_is_an_error() {
        assert!("example.com. 100 IN A 127.0.0.2 ; ID:abc"
            .parse::<DynamicRecord>()
            .is_err());
        assert!("example.com. 100 IN A 127.0.0.2 ; ID"
            .parse::<DynamicRecord>()
            .is_err());
        assert!("example.com. 100 IN A 127.0.0.2 ; Volatile:1"
            .parse::<DynamicRecord>()
            .is_err());
    }

    #[test]
    fn leading_semicolon_marks_disabled() {
        let r: DynamicRecord = ";example.com. 100 IN A 127.0.0.2 ; ID:1".parse().unwrap();
        assert!(r.disabled);
        assert_eq!(r.id, Some(1));
        assert_eq!(r.to_string(), ";example.com. 100 IN A 127.0.0.2 ; ID:1");
    }

    #[test]
    fn multi_line_record_is_rejected() {
        assert!("example.com. 1 IN A 127.0.0.1\nexample.com. 1 IN A 127.0.0.2"
            .parse::<DynamicRecord>()
            .is_err());
    }

    #[test]
    fn roundtrip_textual_form() {
        for text in [
            "example.com. 100 IN A 127.0.0.2",
            "example.com. 100 IN A 127.0.0.2 ; ID:1",
            "example.com. 100 IN A 127.0.0.2 ; Volatile",
            ";example.com. 100 IN A 127.0.0.2 ; ID:9 Volatile",
        ] {
            let record: DynamicRecord = text.parse().unwrap();
            assert_eq!(record.to_string(), text);
        }
    }

    #[test]
    fn set_parses_lines_and_skips_comments() {
        let set: DynamicRecordSet =
            "\nexample.com. 100 IN A 127.0.0.1\n; this is a comment\n;example.com. 100 IN A 127.0.0.2 ; ID:2\n"
                .parse()
                .unwrap();

        assert_eq!(set.len(), 2);
        assert!(!set.0[0].disabled);
        assert!(set.0[1].disabled);
        assert_eq!(set.0[1].id, Some(2));
    }

    #[test]
    fn set_aggregates_errors_with_line_numbers() {
        let err = "example.com. 100 IN A 127.0.0.1\nbogus line\nanother bogus"
            .parse::<DynamicRecordSet>()
            .unwrap_err();

        let text = err.to_string();
        assert!(text.contains("line 2: invalid format: bogus line"), "{}", text);
        assert!(text.contains("line 3: invalid format: another bogus"), "{}", text);
    }

    #[test]
    fn set_display_has_one_record_per_line() {
        let set: DynamicRecordSet = "example.com. 100 IN A 127.0.0.1\nexample.com. 100 IN TXT \"x\""
            .parse()
            .unwrap();
        assert_eq!(
            set.to_string(),
            "example.com. 100 IN A 127.0.0.1\nexample.com. 100 IN TXT \"x\"\n"
        );

        assert_eq!(DynamicRecordSet::new().to_string(), "");
    }

    #[test]
    fn volatile_record_expiry_follows_ttl() {
        let r: DynamicRecord = "example.com. 100 IN A 127.0.0.2 ; Volatile".parse().unwrap();
        let vr = r.volatile_record();
        assert!(vr.expire.is_some());

        let r: DynamicRecord = "example.com. 100 IN A 127.0.0.2".parse().unwrap();
        assert_eq!(r.volatile_record().expire, None);
    }
}
