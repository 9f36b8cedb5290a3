//! DNS resource record and record data
//!
//! Wire-facing resource records: owner name, type, class, TTL, and a typed
//! rdata payload. This is the shape that travels through DNS messages; the
//! zone-file record model in [`crate::record`] converts to and from it.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use super::types::{RecordClass, RecordType};

/// DNS resource record data
///
/// Contains the typed payload for the record types this server handles.
/// Record types outside that set survive parsing as `Unknown` raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RData {
    /// IPv4 address (A record)
    A(Ipv4Addr),
    /// IPv6 address (AAAA record)
    AAAA(Ipv6Addr),
    /// Name server (NS record)
    NS(String),
    /// Canonical name (CNAME record)
    CNAME(String),
    /// Pointer (PTR record)
    PTR(String),
    /// Mail exchange (MX record)
    MX {
        /// Preference value for this MX record
        preference: u16,
        /// Mail exchange hostname
        exchange: String,
    },
    /// Text (TXT record)
    TXT(String),
    /// Service record (SRV record)
    SRV {
        /// Priority of this target
        priority: u16,
        /// Weight for records with same priority
        weight: u16,
        /// Port number of the service
        port: u16,
        /// Target hostname
        target: String,
    },
    /// Unknown or raw record data
    Unknown(Vec<u8>),
}

impl fmt::Display for RData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RData::A(addr) => write!(f, "{}", addr),
            RData::AAAA(addr) => write!(f, "{}", addr),
            RData::NS(name) => write!(f, "{}", name),
            RData::CNAME(name) => write!(f, "{}", name),
            RData::PTR(name) => write!(f, "{}", name),
            RData::MX {
                preference,
                exchange,
            } => write!(f, "{} {}", preference, exchange),
            RData::TXT(text) => write!(f, "\"{}\"", text),
            RData::SRV {
                priority,
                weight,
                port,
                target,
            } => write!(f, "{} {} {} {}", priority, weight, port, target),
            RData::Unknown(data) => write!(f, "<{} bytes>", data.len()),
        }
    }
}

/// DNS resource record
///
/// A complete record as it appears in the answer, authority, or additional
/// section of a DNS message. Owner names are fully qualified.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRecord {
    name: String,
    rtype: RecordType,
    rclass: RecordClass,
    ttl: u32,
    rdata: RData,
}

impl ResourceRecord {
    /// Create a new resource record. The owner name is made fully qualified
    /// if it is not already.
    pub fn new(
        name: impl Into<String>,
        rtype: RecordType,
        rclass: RecordClass,
        ttl: u32,
        rdata: RData,
    ) -> Self {
        let mut name = name.into();
        if !name.ends_with('.') {
            name.push('.');
        }
        Self {
            name,
            rtype,
            rclass,
            ttl,
            rdata,
        }
    }

    /// Get the owner name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the record type.
    pub fn rtype(&self) -> RecordType {
        self.rtype
    }

    /// Get the record class.
    pub fn rclass(&self) -> RecordClass {
        self.rclass
    }

    /// Get the TTL in seconds.
    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    /// Replace the TTL.
    pub fn set_ttl(&mut self, ttl: u32) {
        self.ttl = ttl;
    }

    /// Get the record data.
    pub fn rdata(&self) -> &RData {
        &self.rdata
    }

    /// Key identifying the record with its TTL masked: two records with the
    /// same key are the same answer regardless of their remaining TTL.
    /// Owner names compare case-insensitively.
    pub fn dedup_key(&self) -> (String, RecordType, RecordClass, RData) {
        (
            self.name.to_lowercase(),
            self.rtype,
            self.rclass,
            self.rdata.clone(),
        )
    }
}

impl fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.name, self.ttl, self.rclass, self.rtype, self.rdata
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_record_fqdn() {
        let rr = ResourceRecord::new(
            "example.com",
            RecordType::A,
            RecordClass::IN,
            300,
            RData::A(Ipv4Addr::new(127, 0, 0, 1)),
        );
        assert_eq!(rr.name(), "example.com.");
        assert_eq!(rr.ttl(), 300);
    }

    #[test]
    fn resource_record_display() {
        let rr = ResourceRecord::new(
            "example.com.",
            RecordType::A,
            RecordClass::IN,
            300,
            RData::A(Ipv4Addr::new(127, 0, 0, 1)),
        );
        assert_eq!(rr.to_string(), "example.com. 300 IN A 127.0.0.1");
    }

    #[test]
    fn txt_rdata_quoted() {
        let rdata = RData::TXT("hello world".to_string());
        assert_eq!(rdata.to_string(), "\"hello world\"");
    }

    #[test]
    fn dedup_key_masks_ttl_and_case() {
        let a = ResourceRecord::new(
            "Example.COM.",
            RecordType::A,
            RecordClass::IN,
            300,
            RData::A(Ipv4Addr::new(127, 0, 0, 1)),
        );
        let b = ResourceRecord::new(
            "example.com.",
            RecordType::A,
            RecordClass::IN,
            60,
            RData::A(Ipv4Addr::new(127, 0, 0, 1)),
        );
        assert_eq!(a.dedup_key(), b.dedup_key());

        let c = ResourceRecord::new(
            "example.com.",
            RecordType::A,
            RecordClass::IN,
            60,
            RData::A(Ipv4Addr::new(127, 0, 0, 2)),
        );
        assert_ne!(b.dedup_key(), c.dedup_key());
    }

    #[test]
    fn srv_rdata_display() {
        let rdata = RData::SRV {
            priority: 1,
            weight: 2,
            port: 8080,
            target: "server.example.com.".to_string(),
        };
        assert_eq!(rdata.to_string(), "1 2 8080 server.example.com.");
    }
}
