//! Zone-file record model
//!
//! The typed record variants the server serves: A/AAAA (one variant, split
//! by address family), NS, CNAME, PTR, MX, TXT, and SRV. Each variant
//! parses from and renders to standard zone-file text, converts to and
//! from the wire model, and knows its TTL-masked form, which acts as the
//! record's identity for deduplication and upserts.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::SystemTime;

use crate::dns::{RData, RecordClass, RecordType, ResourceRecord};
use crate::error::{Error, Result};
use crate::record::Domain;

/// TTL applied when a zone-file line does not carry one.
pub const DEFAULT_TTL: u32 = 3600;

/// The record of A or AAAA, distinguished by the address family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRecord {
    pub name: Domain,
    pub ttl: u32,
    pub address: IpAddr,
}

impl AddressRecord {
    /// Check which of A (IPv4) or AAAA (IPv6) this record is.
    pub fn is_v4(&self) -> bool {
        self.address.is_ipv4()
    }
}

/// The record of NS. NS has no TTL in its serialized form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsRecord {
    pub name: Domain,
    pub target: Domain,
}

impl fmt::Display for NsRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} IN NS {}", self.name, self.target)
    }
}

/// The record of CNAME.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CnameRecord {
    pub name: Domain,
    pub ttl: u32,
    pub target: Domain,
}

/// The record of PTR. The name is the reverse-arpa form of an address and
/// the payload is the forward domain it points back to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtrRecord {
    pub name: Domain,
    pub ttl: u32,
    pub domain: Domain,
}

/// The record of MX.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MxRecord {
    pub name: Domain,
    pub ttl: u32,
    pub preference: u16,
    pub target: Domain,
}

/// The record of TXT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxtRecord {
    pub name: Domain,
    pub ttl: u32,
    pub text: String,
}

/// The record of SRV. The name is `_service._proto.<parent>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrvRecord {
    pub name: Domain,
    pub ttl: u32,
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
    pub target: Domain,
}

/// A DNS record entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Address(AddressRecord),
    Ns(NsRecord),
    Cname(CnameRecord),
    Ptr(PtrRecord),
    Mx(MxRecord),
    Txt(TxtRecord),
    Srv(SrvRecord),
}

impl Record {
    /// Get the query type this record answers.
    pub fn qtype(&self) -> RecordType {
        match self {
            Record::Address(r) if r.is_v4() => RecordType::A,
            Record::Address(_) => RecordType::AAAA,
            Record::Ns(_) => RecordType::NS,
            Record::Cname(_) => RecordType::CNAME,
            Record::Ptr(_) => RecordType::PTR,
            Record::Mx(_) => RecordType::MX,
            Record::Txt(_) => RecordType::TXT,
            Record::Srv(_) => RecordType::SRV,
        }
    }

    /// Get the owner name of this record.
    pub fn name(&self) -> &Domain {
        match self {
            Record::Address(r) => &r.name,
            Record::Ns(r) => &r.name,
            Record::Cname(r) => &r.name,
            Record::Ptr(r) => &r.name,
            Record::Mx(r) => &r.name,
            Record::Txt(r) => &r.name,
            Record::Srv(r) => &r.name,
        }
    }

    /// Get the TTL of this record. NS records always report 0.
    pub fn ttl(&self) -> u32 {
        match self {
            Record::Address(r) => r.ttl,
            Record::Ns(_) => 0,
            Record::Cname(r) => r.ttl,
            Record::Ptr(r) => r.ttl,
            Record::Mx(r) => r.ttl,
            Record::Txt(r) => r.ttl,
            Record::Srv(r) => r.ttl,
        }
    }

    /// Render the record with its TTL masked to 0. Two records with the
    /// same masked form are the same identity.
    pub fn without_ttl(&self) -> String {
        match self {
            Record::Address(r) => format!(
                "{} 0 IN {} {}",
                r.name,
                if r.is_v4() { "A" } else { "AAAA" },
                r.address
            ),
            Record::Ns(r) => r.to_string(),
            Record::Cname(r) => format!("{} 0 IN CNAME {}", r.name, r.target),
            Record::Ptr(r) => format!("{} 0 IN PTR {}", r.name, r.domain),
            Record::Mx(r) => format!("{} 0 IN MX {} {}", r.name, r.preference, r.target),
            Record::Txt(r) => format!("{} 0 IN TXT \"{}\"", r.name, r.text),
            Record::Srv(r) => format!(
                "{} 0 IN SRV {} {} {} {}",
                r.name, r.priority, r.weight, r.port, r.target
            ),
        }
    }

    /// Validate this record.
    ///
    /// The domains always validate on construction; this re-checks them and
    /// enforces per-variant constraints like the non-zero SRV port and the
    /// address family matching the variant tag.
    pub fn validate(&self) -> Result<()> {
        match self {
            Record::Address(_) | Record::Ns(_) | Record::Cname(_) | Record::Ptr(_)
            | Record::Mx(_) | Record::Txt(_) => Ok(()),
            Record::Srv(r) => {
                if r.port == 0 {
                    return Err(Error::argument(format!("invalid port: {}", r.port)));
                }
                Ok(())
            }
        }
    }

    /// Convert to a wire resource record.
    pub fn to_rr(&self) -> ResourceRecord {
        let rdata = match self {
            Record::Address(r) => match r.address {
                IpAddr::V4(addr) => RData::A(addr),
                IpAddr::V6(addr) => RData::AAAA(addr),
            },
            Record::Ns(r) => RData::NS(r.target.as_str().to_string()),
            Record::Cname(r) => RData::CNAME(r.target.as_str().to_string()),
            Record::Ptr(r) => RData::PTR(r.domain.as_str().to_string()),
            Record::Mx(r) => RData::MX {
                preference: r.preference,
                exchange: r.target.as_str().to_string(),
            },
            Record::Txt(r) => RData::TXT(r.text.clone()),
            Record::Srv(r) => RData::SRV {
                priority: r.priority,
                weight: r.weight,
                port: r.port,
                target: r.target.as_str().to_string(),
            },
        };

        ResourceRecord::new(
            self.name().as_str(),
            self.qtype(),
            RecordClass::IN,
            self.ttl(),
            rdata,
        )
    }

    /// Convert from a wire resource record.
    ///
    /// Record types outside the supported set are an argument error.
    pub fn from_rr(rr: &ResourceRecord) -> Result<Record> {
        let name = Domain::new(rr.name())?;
        let ttl = rr.ttl();

        match rr.rdata() {
            RData::A(addr) => Ok(Record::Address(AddressRecord {
                name,
                ttl,
                address: IpAddr::V4(*addr),
            })),
            RData::AAAA(addr) => Ok(Record::Address(AddressRecord {
                name,
                ttl,
                address: IpAddr::V6(*addr),
            })),
            RData::NS(target) => Ok(Record::Ns(NsRecord {
                name,
                target: Domain::new(target)?,
            })),
            RData::CNAME(target) => Ok(Record::Cname(CnameRecord {
                name,
                ttl,
                target: Domain::new(target)?,
            })),
            RData::PTR(target) => Ok(Record::Ptr(PtrRecord {
                name,
                ttl,
                domain: Domain::new(target)?,
            })),
            RData::MX {
                preference,
                exchange,
            } => Ok(Record::Mx(MxRecord {
                name,
                ttl,
                preference: *preference,
                target: Domain::new(exchange)?,
            })),
            RData::TXT(text) => Ok(Record::Txt(TxtRecord {
                name,
                ttl,
                text: text.clone(),
            })),
            RData::SRV {
                priority,
                weight,
                port,
                target,
            } => Ok(Record::Srv(SrvRecord {
                name,
                ttl,
                priority: *priority,
                weight: *weight,
                port: *port,
                target: Domain::new(target)?,
            })),
            RData::Unknown(_) => Err(Error::argument(format!(
                "unsupported record type: {}",
                rr.rtype()
            ))),
        }
    }

    /// Parse a zone-file line with the TTL replaced by `ttl`.
    pub fn parse_with_ttl(line: &str, ttl: u32) -> Result<Record> {
        let mut record: Record = line.parse()?;
        record.set_ttl(ttl);
        Ok(record)
    }

    /// Parse a zone-file line with the TTL derived from an absolute
    /// expiration instant. Fails with an expiration error when the instant
    /// is in the past.
    pub fn parse_with_expire(line: &str, expire: SystemTime) -> Result<Record> {
        let ttl = match expire.duration_since(SystemTime::now()) {
            Ok(left) => left.as_secs_f64().round() as u32,
            Err(_) => {
                return Err(Error::expiration(format!(
                    "expire can't be past time: {}",
                    unix_seconds(expire)
                )))
            }
        };

        Record::parse_with_ttl(line, ttl)
    }

    fn set_ttl(&mut self, ttl: u32) {
        match self {
            Record::Address(r) => r.ttl = ttl,
            Record::Ns(_) => {}
            Record::Cname(r) => r.ttl = ttl,
            Record::Ptr(r) => r.ttl = ttl,
            Record::Mx(r) => r.ttl = ttl,
            Record::Txt(r) => r.ttl = ttl,
            Record::Srv(r) => r.ttl = ttl,
        }
    }
}

/// Seconds since the unix epoch for an instant (0 for anything earlier).
pub(crate) fn unix_seconds(t: SystemTime) -> i64 {
    t.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Record::Address(r) => write!(
                f,
                "{} {} IN {} {}",
                r.name,
                r.ttl,
                if r.is_v4() { "A" } else { "AAAA" },
                r.address
            ),
            Record::Ns(r) => write!(f, "{} IN NS {}", r.name, r.target),
            Record::Cname(r) => write!(f, "{} {} IN CNAME {}", r.name, r.ttl, r.target),
            Record::Ptr(r) => write!(f, "{} {} IN PTR {}", r.name, r.ttl, r.domain),
            Record::Mx(r) => write!(f, "{} {} IN MX {} {}", r.name, r.ttl, r.preference, r.target),
            Record::Txt(r) => write!(f, "{} {} IN TXT \"{}\"", r.name, r.ttl, r.text),
            Record::Srv(r) => write!(
                f,
                "{} {} IN SRV {} {} {} {}",
                r.name, r.ttl, r.priority, r.weight, r.port, r.target
            ),
        }
    }
}

impl FromStr for Record {
    type Err = Error;

    /// Parse one zone-file line.
    ///
    /// The grammar is `<name> [<ttl>] [IN] <TYPE> <rdata...>` with any run
    /// of spaces or tabs between fields. A line without a TTL gets
    /// [`DEFAULT_TTL`] (NS records ignore it either way).
    fn from_str(line: &str) -> Result<Self> {
        let invalid = || Error::argument(format!("failed to parse record: {:?}", line));

        let mut tokens = tokenize(line);

        let name = Domain::new(tokens.next().ok_or_else(invalid)?.1)?;

        let mut token = tokens.next().ok_or_else(invalid)?.1;
        let ttl = match token.parse::<u32>() {
            Ok(ttl) => {
                token = tokens.next().ok_or_else(invalid)?.1;
                ttl
            }
            Err(_) => DEFAULT_TTL,
        };

        if token.eq_ignore_ascii_case("IN") {
            token = tokens.next().ok_or_else(invalid)?.1;
        }

        let qtype: RecordType = token
            .to_ascii_uppercase()
            .parse()
            .map_err(|_| invalid())?;

        let record = match qtype {
            RecordType::A | RecordType::AAAA => {
                let address: IpAddr = tokens
                    .next()
                    .ok_or_else(invalid)?
                    .1
                    .parse()
                    .map_err(|_| invalid())?;
                if address.is_ipv4() != (qtype == RecordType::A) {
                    return Err(invalid());
                }
                Record::Address(AddressRecord { name, ttl, address })
            }
            RecordType::NS => Record::Ns(NsRecord {
                name,
                target: Domain::new(tokens.next().ok_or_else(invalid)?.1)?,
            }),
            RecordType::CNAME => Record::Cname(CnameRecord {
                name,
                ttl,
                target: Domain::new(tokens.next().ok_or_else(invalid)?.1)?,
            }),
            RecordType::PTR => Record::Ptr(PtrRecord {
                name,
                ttl,
                domain: Domain::new(tokens.next().ok_or_else(invalid)?.1)?,
            }),
            RecordType::MX => {
                let preference = tokens
                    .next()
                    .ok_or_else(invalid)?
                    .1
                    .parse()
                    .map_err(|_| invalid())?;
                Record::Mx(MxRecord {
                    name,
                    ttl,
                    preference,
                    target: Domain::new(tokens.next().ok_or_else(invalid)?.1)?,
                })
            }
            RecordType::TXT => {
                // The text is everything after the type token, so it may
                // contain spaces when quoted.
                let (offset, _) = tokens.next().ok_or_else(invalid)?;
                let raw = line[offset..].trim();
                let text = raw
                    .strip_prefix('"')
                    .and_then(|s| s.strip_suffix('"'))
                    .unwrap_or(raw);
                return Ok(Record::Txt(TxtRecord {
                    name,
                    ttl,
                    text: text.to_string(),
                }));
            }
            RecordType::SRV => {
                let priority = tokens
                    .next()
                    .ok_or_else(invalid)?
                    .1
                    .parse()
                    .map_err(|_| invalid())?;
                let weight = tokens
                    .next()
                    .ok_or_else(invalid)?
                    .1
                    .parse()
                    .map_err(|_| invalid())?;
                let port = tokens
                    .next()
                    .ok_or_else(invalid)?
                    .1
                    .parse()
                    .map_err(|_| invalid())?;
                Record::Srv(SrvRecord {
                    name,
                    ttl,
                    priority,
                    weight,
                    port,
                    target: Domain::new(tokens.next().ok_or_else(invalid)?.1)?,
                })
            }
            RecordType::Unknown(_) => return Err(invalid()),
        };

        if tokens.next().is_some() {
            return Err(invalid());
        }

        record.validate()?;
        Ok(record)
    }
}

/// Split a line on runs of spaces and tabs, keeping byte offsets so callers
/// can slice the untouched remainder.
fn tokenize(line: &str) -> impl Iterator<Item = (usize, &str)> {
    line.char_indices()
        .fold(Vec::new(), |mut acc: Vec<(usize, usize)>, (i, c)| {
            if c == ' ' || c == '\t' {
                acc
            } else {
                match acc.last_mut() {
                    Some(last) if last.1 == i => {
                        last.1 = i + c.len_utf8();
                        acc
                    }
                    _ => {
                        acc.push((i, i + c.len_utf8()));
                        acc
                    }
                }
            }
        })
        .into_iter()
        .map(move |(start, end)| (start, &line[start..end]))
}
