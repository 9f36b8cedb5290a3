//! Response writers
//!
//! The sink side of resolution: resolvers emit records into a
//! [`ResponseWriter`] without knowing whether they end up in a DNS reply,
//! a cache accumulator, or a test assertion. The hook wrapper composes a
//! callback in front of an existing writer; the message builder is the
//! writer the handler uses to assemble the final wire reply.

use std::collections::HashSet;

use crate::dns::{Message, ResourceRecord};
use crate::error::Result;
use crate::record::Record;

/// Sink for resolved records.
pub trait ResponseWriter: Send {
    /// Add a record to the response.
    fn add(&mut self, record: Record) -> Result<()>;

    /// Check whether the response is still authoritative.
    fn is_authoritative(&self) -> bool;

    /// Mark the response non-authoritative. There is no way back: once an
    /// upstream contributed, the whole response is non-authoritative.
    fn set_no_authoritative(&mut self);
}

/// A [`ResponseWriter`] that hands every record to a callback.
///
/// Starts out authoritative, like a fresh response.
pub struct ResponseCallback<F: FnMut(Record) -> Result<()> + Send> {
    callback: F,
    authoritative: bool,
}

impl<F: FnMut(Record) -> Result<()> + Send> ResponseCallback<F> {
    /// Wrap a callback into a writer.
    pub fn new(callback: F) -> Self {
        ResponseCallback {
            callback,
            authoritative: true,
        }
    }
}

impl<F: FnMut(Record) -> Result<()> + Send> ResponseWriter for ResponseCallback<F> {
    fn add(&mut self, record: Record) -> Result<()> {
        (self.callback)(record)
    }

    fn is_authoritative(&self) -> bool {
        self.authoritative
    }

    fn set_no_authoritative(&mut self) {
        self.authoritative = false;
    }
}

/// A wrapper that calls a hook before delegating `add` to the underlying
/// writer. The authoritative flag is shared with the wrapped writer.
pub struct ResponseWriterHook<'a> {
    writer: &'a mut dyn ResponseWriter,
    on_add: Box<dyn FnMut(&Record) -> Result<()> + Send + 'a>,
}

impl<'a> ResponseWriterHook<'a> {
    /// Wrap `writer`, calling `on_add` before every delegated add.
    pub fn new(
        writer: &'a mut dyn ResponseWriter,
        on_add: impl FnMut(&Record) -> Result<()> + Send + 'a,
    ) -> Self {
        ResponseWriterHook {
            writer,
            on_add: Box::new(on_add),
        }
    }
}

impl ResponseWriter for ResponseWriterHook<'_> {
    fn add(&mut self, record: Record) -> Result<()> {
        (self.on_add)(&record)?;
        self.writer.add(record)
    }

    fn is_authoritative(&self) -> bool {
        self.writer.is_authoritative()
    }

    fn set_no_authoritative(&mut self) {
        self.writer.set_no_authoritative();
    }
}

/// A [`ResponseWriter`] that accumulates wire records and builds the reply
/// message.
///
/// Records are deduplicated once, at build time, on their TTL-masked wire
/// form; the first occurrence wins. The response carries the authoritative
/// flag accumulated during resolution and the recursion-available flag the
/// builder was constructed with.
pub struct MessageBuilder {
    request: Message,
    records: Vec<ResourceRecord>,
    authoritative: bool,
    recursion_available: bool,
}

impl MessageBuilder {
    /// Create a builder for a reply to `request`.
    pub fn new(request: &Message, recursion_available: bool) -> Self {
        MessageBuilder {
            request: request.clone(),
            records: Vec::with_capacity(10),
            authoritative: true,
            recursion_available,
        }
    }

    /// Build the reply message.
    pub fn build(&self) -> Message {
        let mut msg = Message::reply_to(&self.request);

        let mut seen = HashSet::new();
        for rr in &self.records {
            if seen.insert(rr.dedup_key()) {
                msg.add_answer(rr.clone());
            }
        }

        msg.set_authoritative(self.authoritative);
        msg.set_recursion_available(self.recursion_available);

        msg
    }
}

impl ResponseWriter for MessageBuilder {
    fn add(&mut self, record: Record) -> Result<()> {
        self.records.push(record.to_rr());
        Ok(())
    }

    fn is_authoritative(&self) -> bool {
        self.authoritative
    }

    fn set_no_authoritative(&mut self) {
        self.authoritative = false;
    }
}
