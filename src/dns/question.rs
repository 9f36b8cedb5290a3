//! DNS question section entry

use std::fmt;

use super::types::{RecordClass, RecordType};

/// A single entry of a DNS message's question section.
///
/// The qname is kept fully qualified (with a trailing dot) so it can be
/// compared directly against record owner names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    qname: String,
    qtype: RecordType,
    qclass: RecordClass,
}

impl Question {
    /// Create a new question. The name is made fully qualified if it is not
    /// already.
    pub fn new(qname: impl Into<String>, qtype: RecordType, qclass: RecordClass) -> Self {
        let mut qname = qname.into();
        if !qname.ends_with('.') {
            qname.push('.');
        }
        Self {
            qname,
            qtype,
            qclass,
        }
    }

    /// Get the queried name.
    pub fn qname(&self) -> &str {
        &self.qname
    }

    /// Get the queried record type.
    pub fn qtype(&self) -> RecordType {
        self.qtype
    }

    /// Get the queried record class.
    pub fn qclass(&self) -> RecordClass {
        self.qclass
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ";{} {} {}", self.qname, self.qclass, self.qtype)
    }
}
