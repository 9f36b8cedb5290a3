//! Static zone resolver
//!
//! An immutable in-memory resolver built from a declarative YAML document.
//! Records are indexed by query type and name at construction; reads are
//! lock-free. A/AAAA entries get their reverse PTR records synthesized at
//! load time.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::net::IpAddr;

use async_trait::async_trait;
use serde::Deserialize;

use crate::dns::RecordType;
use crate::error::{Error, Result};
use crate::record::{
    AddressRecord, CnameRecord, Domain, PtrRecord, Record, SrvRecord, TxtRecord, DEFAULT_TTL,
};
use crate::resolver::{Request, Resolver, ResponseWriter};

/// Configuration for one SRV entry of the static zone.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SrvEntry {
    pub service: String,
    #[serde(default = "default_proto")]
    pub proto: String,
    #[serde(default)]
    pub priority: u16,
    #[serde(default)]
    pub weight: u16,
    pub port: u16,
    pub target: Domain,
}

fn default_proto() -> String {
    "tcp".to_string()
}

impl SrvEntry {
    /// Build the SRV record `_service._proto.<name>`.
    fn to_record(&self, name: &Domain, ttl: u32) -> Result<SrvRecord> {
        Ok(SrvRecord {
            name: Domain::new(format!("_{}._{}.{}", self.service, self.proto, name))?,
            ttl,
            priority: self.priority,
            weight: self.weight,
            port: self.port,
            target: self.target.clone(),
        })
    }
}

/// Declarative configuration of a static zone.
///
/// Unknown keys are rejected as an argument error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZoneConfig {
    /// TTL applied to every record of this zone (default 3600).
    pub ttl: Option<u32>,
    /// A/AAAA records; each address also synthesizes a reverse PTR.
    #[serde(default)]
    pub address: HashMap<Domain, Vec<IpAddr>>,
    /// CNAME records.
    #[serde(default)]
    pub cname: HashMap<Domain, Vec<Domain>>,
    /// TXT records.
    #[serde(default)]
    pub text: HashMap<Domain, Vec<String>>,
    /// SRV records.
    #[serde(default)]
    pub service: HashMap<Domain, Vec<SrvEntry>>,
}

impl ZoneConfig {
    /// Parse a YAML document into a zone configuration.
    pub fn parse(text: &str) -> Result<Self> {
        serde_yaml::from_str(text)
            .map_err(|e| Error::argument_caused("failed to parse zone configuration", e))
    }

    /// Build the record list this configuration describes, every record
    /// validated before admission.
    pub fn records(&self) -> Result<Vec<Record>> {
        let ttl = self.ttl.unwrap_or(DEFAULT_TTL);
        let mut records = Vec::new();

        for (name, addresses) in &self.address {
            for address in addresses {
                records.push(Record::Address(AddressRecord {
                    name: name.clone(),
                    ttl,
                    address: *address,
                }));
                records.push(Record::Ptr(PtrRecord {
                    name: Domain::reverse(*address),
                    ttl,
                    domain: name.clone(),
                }));
            }
        }

        for (name, targets) in &self.cname {
            for target in targets {
                records.push(Record::Cname(CnameRecord {
                    name: name.clone(),
                    ttl,
                    target: target.clone(),
                }));
            }
        }

        for (name, texts) in &self.text {
            for text in texts {
                records.push(Record::Txt(TxtRecord {
                    name: name.clone(),
                    ttl,
                    text: text.clone(),
                }));
            }
        }

        for (name, services) in &self.service {
            for service in services {
                records.push(Record::Srv(service.to_record(name, ttl)?));
            }
        }

        for record in &records {
            record.validate()?;
        }

        Ok(records)
    }
}

/// A simple static implementation of [`Resolver`].
///
/// Immutable after construction, so resolution needs no locking.
pub struct StaticResolver {
    index: HashMap<(RecordType, Domain), Vec<Record>>,
}

impl StaticResolver {
    /// Index a list of records by query type and name. Insertion order is
    /// kept within each index entry.
    pub fn new(records: Vec<Record>) -> Self {
        let mut index: HashMap<(RecordType, Domain), Vec<Record>> = HashMap::new();

        for record in records {
            index
                .entry((record.qtype(), record.name().clone()))
                .or_default()
                .push(record);
        }

        StaticResolver { index }
    }

    /// Build a resolver from a YAML zone configuration document.
    pub fn from_config(text: &str) -> Result<Self> {
        Ok(StaticResolver::new(ZoneConfig::parse(text)?.records()?))
    }

    fn record_count(&self) -> usize {
        self.index.values().map(Vec::len).sum()
    }

    fn domain_count(&self) -> usize {
        self.index
            .keys()
            .map(|(_, name)| name)
            .collect::<HashSet<_>>()
            .len()
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn resolve(&self, w: &mut dyn ResponseWriter, req: &Request) -> Result<()> {
        if let Some(records) = self.index.get(&(req.qtype, req.name.clone())) {
            for record in records {
                w.add(record.clone())?;
            }
        }
        Ok(())
    }

    fn recursion_available(&self) -> bool {
        false
    }
}

impl fmt::Display for StaticResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StaticResolver[{} domains {} records]",
            self.domain_count(),
            self.record_count()
        )
    }
}
