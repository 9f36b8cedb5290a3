//! Domain names
//!
//! A [`Domain`] is a case-insensitive DNS name held in its fully-qualified
//! form: construction appends the trailing dot, folds to lowercase, and
//! validates the labels. Because every constructor goes through validation,
//! the rest of the crate can compare domains with plain equality.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::de;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Maximum length of a domain name, excluding the trailing dot.
const MAX_NAME_LEN: usize = 253;

/// Maximum length of a single label.
const MAX_LABEL_LEN: usize = 63;

/// A validated, fully-qualified, lowercase DNS name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Domain(String);

impl Domain {
    /// Validate and normalize a name into a `Domain`.
    ///
    /// Accepts names with or without the trailing dot; rejects empty names
    /// and names with empty, over-long, or otherwise malformed labels.
    pub fn new(name: impl AsRef<str>) -> Result<Self> {
        let raw = name.as_ref();
        let trimmed = raw.strip_suffix('.').unwrap_or(raw);

        if trimmed.is_empty() {
            return Err(Error::argument(format!("invalid domain: {:?}", raw)));
        }
        if trimmed.len() > MAX_NAME_LEN {
            return Err(Error::argument(format!("invalid domain: {:?}", raw)));
        }

        for label in trimmed.split('.') {
            if label.is_empty() || label.len() > MAX_LABEL_LEN {
                return Err(Error::argument(format!("invalid domain: {:?}", raw)));
            }
            if !label
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
            {
                return Err(Error::argument(format!("invalid domain: {:?}", raw)));
            }
        }

        let mut normalized = trimmed.to_ascii_lowercase();
        normalized.push('.');
        Ok(Domain(normalized))
    }

    /// Get the name as a fully-qualified string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate the labels, left to right, without the root label.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.0.trim_end_matches('.').split('.')
    }

    /// Make the reversed path view used for hierarchical keying, like
    /// `/com/example` for `example.com.`.
    pub fn to_path(&self) -> String {
        let mut labels: Vec<&str> = self.labels().collect();
        labels.reverse();
        format!("/{}", labels.join("/"))
    }

    /// Check whether this name equals `suffix` or ends with it on a label
    /// boundary.
    pub fn has_suffix(&self, suffix: &Domain) -> bool {
        self == suffix || self.0.ends_with(&format!(".{}", suffix.0))
    }

    /// Compute the reverse-arpa name for an address, like
    /// `2.0.0.127.in-addr.arpa.` for `127.0.0.2`.
    pub fn reverse(addr: IpAddr) -> Domain {
        match addr {
            IpAddr::V4(v4) => {
                let o = v4.octets();
                Domain(format!("{}.{}.{}.{}.in-addr.arpa.", o[3], o[2], o[1], o[0]))
            }
            IpAddr::V6(v6) => {
                let mut nibbles = Vec::with_capacity(32);
                for byte in v6.octets().iter().rev() {
                    nibbles.push(format!("{:x}", byte & 0x0f));
                    nibbles.push(format!("{:x}", byte >> 4));
                }
                Domain(format!("{}.ip6.arpa.", nibbles.join(".")))
            }
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Domain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Domain::new(s)
    }
}

impl Serialize for Domain {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Domain {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Domain::new(&raw).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn normalizes_to_fqdn() {
        assert_eq!(Domain::new("example.com").unwrap().as_str(), "example.com.");
        assert_eq!(Domain::new("example.com.").unwrap().as_str(), "example.com.");
        assert_eq!(Domain::new("Example.COM").unwrap().as_str(), "example.com.");
    }

    #[test]
    fn rejects_invalid_names() {
        assert!(Domain::new("").is_err());
        assert!(Domain::new(".").is_err());
        assert!(Domain::new("foo..bar").is_err());
        assert!(Domain::new(".example.com").is_err());
        assert!(Domain::new("has space.com").is_err());
        assert!(Domain::new("a".repeat(64) + ".com").is_err());
    }

    #[test]
    fn accepts_service_and_arpa_labels() {
        assert!(Domain::new("_http._tcp.example.com.").is_ok());
        assert!(Domain::new("2.0.0.127.in-addr.arpa.").is_ok());
    }

    #[test]
    fn to_path_reverses_labels() {
        assert_eq!(Domain::new("example.com.").unwrap().to_path(), "/com/example");
        assert_eq!(
            Domain::new("a.b.example.com.").unwrap().to_path(),
            "/com/example/b/a"
        );
    }

    #[test]
    fn suffix_matching_is_label_aligned() {
        let suffix = Domain::new("example.com.").unwrap();
        assert!(Domain::new("example.com.").unwrap().has_suffix(&suffix));
        assert!(Domain::new("www.example.com.").unwrap().has_suffix(&suffix));
        assert!(!Domain::new("notexample.com.").unwrap().has_suffix(&suffix));
        assert!(!Domain::new("example.org.").unwrap().has_suffix(&suffix));
    }

    #[test]
    fn reverse_v4() {
        let d = Domain::reverse(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 2)));
        assert_eq!(d.as_str(), "2.0.0.127.in-addr.arpa.");
    }

    #[test]
    fn reverse_v6() {
        let d = Domain::reverse(IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1)));
        assert_eq!(
            d.as_str(),
            "1.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.8.b.d.0.1.0.0.2.ip6.arpa."
        );
    }

    #[test]
    fn serde_roundtrip() {
        let d: Domain = serde_yaml::from_str("example.com").unwrap();
        assert_eq!(d.as_str(), "example.com.");
        assert!(serde_yaml::from_str::<Domain>("\"foo..bar\"").is_err());
    }
}
