//! Dynamic zone resolver interface
//!
//! The mutable, persistent counterpart of the static zone: records carry
//! engine-assigned IDs, can be volatile, and are queried by exact name,
//! label-aligned suffix, or glob pattern. The REST management API works
//! exclusively through this trait.

use async_trait::async_trait;
use regex::Regex;

use crate::error::{Error, Result};
use crate::record::{Domain, DynamicRecordSet};
use crate::resolver::Resolver;

/// The error returned when a record ID does not exist.
pub fn no_such_record() -> Error {
    Error::argument("no such record")
}

/// A resolver whose records can be mutated at runtime.
#[async_trait]
pub trait DynamicResolver: Resolver {
    /// Apply a record set: disabled records are removed (by ID when they
    /// carry one, else by TTL-masked form), everything else is upserted.
    /// A/AAAA upserts and removals keep their reverse PTR in sync.
    async fn set_records(&self, records: DynamicRecordSet) -> Result<()>;

    /// Get all non-expired records in ID order.
    async fn records(&self) -> Result<DynamicRecordSet>;

    /// Get all records whose name equals `suffix` or ends with it on a
    /// label boundary.
    async fn search_records(&self, suffix: &Domain) -> Result<DynamicRecordSet>;

    /// Get all records whose name matches a glob pattern.
    async fn glob_records(&self, pattern: &str) -> Result<DynamicRecordSet>;

    /// Get the record with this ID; the set is empty when there is none.
    async fn get_record(&self, id: i64) -> Result<DynamicRecordSet>;

    /// Remove the record with this ID, or fail with [`no_such_record`].
    async fn remove_record(&self, id: i64) -> Result<()>;
}

/// Compile a glob pattern into an anchored matcher: `*` matches any
/// non-empty run of bytes and every regex metacharacter is escaped.
pub(crate) fn compile_glob(pattern: &str) -> Result<Regex> {
    let escaped = regex::escape(pattern).replace("\\*", ".+");

    Regex::new(&format!("^{}$", escaped))
        .map_err(|e| Error::internal_caused("failed to compile glob", e))
}
