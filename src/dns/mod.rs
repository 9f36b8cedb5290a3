//! DNS protocol model and wire codec
//!
//! The message, question, and resource-record types the rest of the crate
//! works with, plus conversion to and from the RFC 1035 binary format via
//! hickory-proto in [`wire`]. Names in this module are always fully
//! qualified (trailing dot).

pub mod message;
pub mod question;
pub mod record;
pub mod types;
pub mod wire;

pub use message::Message;
pub use question::Question;
pub use record::{RData, ResourceRecord};
pub use types::{OpCode, RecordClass, RecordType, ResponseCode};
