//! Zone-file record model
//!
//! Domains, typed record variants, dynamic-record annotations, and
//! volatile records with absolute expiration. Everything here works on the
//! textual zone-file form; the wire shape lives in [`crate::dns`].

pub mod domain;
pub mod dynamic;
pub mod record;
pub mod volatile;

pub use domain::Domain;
pub use dynamic::{DynamicRecord, DynamicRecordSet};
pub use record::{
    AddressRecord, CnameRecord, MxRecord, NsRecord, PtrRecord, Record, SrvRecord, TxtRecord,
    DEFAULT_TTL,
};
pub use volatile::VolatileRecord;
