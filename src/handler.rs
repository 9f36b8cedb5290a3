//! Query handler
//!
//! Bridges a parsed wire query to the resolver pipeline: every question is
//! resolved into a shared message builder, resolver errors are logged and
//! counted without short-circuiting the remaining questions, and the reply
//! carries the authoritative bit accumulated during resolution plus the
//! recursion-available bit precomputed from the root resolver.

use std::sync::Arc;

use async_trait::async_trait;

use crate::dns::{Message, OpCode};
use crate::error::Result;
use crate::metrics::Metrics;
use crate::record::Domain;
use crate::resolver::{MessageBuilder, Request, Resolver};
use crate::server::RequestHandler;
use tracing::{info, warn};

/// The DNS request handler in front of the resolver pipeline.
pub struct Handler {
    resolver: Arc<dyn Resolver>,
    metrics: Arc<Metrics>,
    recursion_available: bool,
}

impl Handler {
    /// Create a handler. The recursion-available bit is taken from the
    /// root resolver once, at construction.
    pub fn new(resolver: Arc<dyn Resolver>, metrics: Arc<Metrics>) -> Self {
        let recursion_available = resolver.recursion_available();
        Handler {
            resolver,
            metrics,
            recursion_available,
        }
    }

    /// Resolve one wire query into a wire reply.
    pub async fn serve(&self, request: &Message) -> Message {
        let timer = self.metrics.start(request);
        let mut builder = MessageBuilder::new(request, self.recursion_available);
        let mut errored = false;

        if request.opcode() == OpCode::Query {
            for question in request.questions() {
                let name = match Domain::new(question.qname()) {
                    Ok(name) => name,
                    Err(err) => {
                        warn!(proto = "dns", name = question.qname(), reason = %err, "failed to resolve");
                        errored = true;
                        continue;
                    }
                };
                let req = Request::new(name, question.qtype(), request.recursion_desired());

                if let Err(err) = self.resolver.resolve(&mut builder, &req).await {
                    warn!(
                        proto = "dns",
                        name = %req.name,
                        r#type = %req.qtype,
                        reason = %err,
                        "failed to resolve"
                    );
                    self.metrics.error(&req);
                    errored = true;
                }
            }
        }

        let reply = builder.build();
        timer.finish(&reply);

        if !errored && reply.answers().is_empty() && !reply.questions().is_empty() {
            let question = &reply.questions()[0];
            info!(
                proto = "dns",
                name = question.qname(),
                r#type = %question.qtype(),
                "not found"
            );
        }

        reply
    }
}

#[async_trait]
impl RequestHandler for Handler {
    async fn handle(&self, request: Message) -> Result<Message> {
        Ok(self.serve(&request).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::{Question, RecordClass, RecordType};
    use crate::record::Record;
    use crate::resolver::StaticResolver;

    fn handler(lines: &[&str]) -> (Handler, Arc<Metrics>) {
        let records: Vec<Record> = lines.iter().map(|l| l.parse().unwrap()).collect();
        let metrics = Arc::new(Metrics::new("handler_test").unwrap());
        (
            Handler::new(Arc::new(StaticResolver::new(records)), metrics.clone()),
            metrics,
        )
    }

    fn query(name: &str, qtype: RecordType) -> Message {
        let mut msg = Message::new();
        msg.set_id(42);
        msg.add_question(Question::new(name, qtype, RecordClass::IN));
        msg
    }

    #[tokio::test]
    async fn answers_matching_questions() {
        let (handler, _) = handler(&["example.com. 10 IN A 127.0.0.1"]);

        let reply = handler.serve(&query("example.com.", RecordType::A)).await;

        assert_eq!(reply.id(), 42);
        assert!(reply.is_response());
        assert!(reply.is_authoritative());
        assert!(!reply.recursion_available());
        assert_eq!(reply.answers().len(), 1);
        assert_eq!(reply.answers()[0].to_string(), "example.com. 10 IN A 127.0.0.1");
    }

    #[tokio::test]
    async fn resolves_every_question_of_a_message() {
        let (handler, _) = handler(&[
            "example.com. 10 IN A 127.0.0.1",
            "example.com. 10 IN TXT \"hi\"",
        ]);

        let mut request = query("example.com.", RecordType::A);
        request.add_question(Question::new("example.com.", RecordType::TXT, RecordClass::IN));

        let reply = handler.serve(&request).await;
        assert_eq!(reply.answers().len(), 2);
    }

    #[tokio::test]
    async fn duplicate_answers_collapse() {
        let (handler, _) = handler(&["example.com. 10 IN A 127.0.0.1"]);

        let mut request = query("example.com.", RecordType::A);
        request.add_question(Question::new("example.com.", RecordType::A, RecordClass::IN));

        let reply = handler.serve(&request).await;
        assert_eq!(reply.answers().len(), 1);
    }

    #[tokio::test]
    async fn non_query_opcodes_skip_resolution() {
        let (handler, metrics) = handler(&["example.com. 10 IN A 127.0.0.1"]);

        let mut request = query("example.com.", RecordType::A);
        request.set_opcode(OpCode::Update);

        let reply = handler.serve(&request).await;
        assert!(reply.answers().is_empty());

        let text = metrics.gather().unwrap();
        assert!(
            text.contains("handler_test_received_message_count{type=\"another\"} 1"),
            "{}",
            text
        );
    }

    #[tokio::test]
    async fn invalid_question_name_is_counted_not_fatal() {
        let (handler, _) = handler(&["example.com. 10 IN A 127.0.0.1"]);

        let mut request = Message::new();
        request.add_question(Question::new("bad..name.", RecordType::A, RecordClass::IN));
        request.add_question(Question::new("example.com.", RecordType::A, RecordClass::IN));

        let reply = handler.serve(&request).await;
        assert_eq!(reply.answers().len(), 1);
    }
}
