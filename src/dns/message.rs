//! DNS message implementation
//!
//! The DNS message structure as defined in RFC 1035: a header plus the
//! question, answer, authority, and additional sections. The same structure
//! represents queries and responses.

use std::fmt;

use super::question::Question;
use super::record::ResourceRecord;
use super::types::{OpCode, ResponseCode};

/// DNS message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    id: u16,
    /// Query/Response flag (false = query, true = response)
    qr: bool,
    opcode: OpCode,
    /// Authoritative answer flag
    aa: bool,
    /// Truncation flag
    tc: bool,
    /// Recursion desired flag
    rd: bool,
    /// Recursion available flag
    ra: bool,
    rcode: ResponseCode,
    questions: Vec<Question>,
    answers: Vec<ResourceRecord>,
    authority: Vec<ResourceRecord>,
    additional: Vec<ResourceRecord>,
}

impl Message {
    /// Create a new DNS message, initialized as a query with the QUERY
    /// opcode and recursion desired.
    pub fn new() -> Self {
        Self {
            id: 0,
            qr: false,
            opcode: OpCode::Query,
            aa: false,
            tc: false,
            rd: true,
            ra: false,
            rcode: ResponseCode::NoError,
            questions: Vec::new(),
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    /// Build the skeleton of a reply for a query: same id and questions,
    /// response bit set, recursion-desired copied.
    pub fn reply_to(request: &Message) -> Self {
        let mut msg = Message::new();
        msg.set_id(request.id());
        msg.set_response(true);
        msg.set_opcode(request.opcode());
        msg.set_recursion_desired(request.recursion_desired());
        for q in request.questions() {
            msg.add_question(q.clone());
        }
        msg
    }

    /// Get the message ID.
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Set the message ID.
    pub fn set_id(&mut self, id: u16) {
        self.id = id;
    }

    /// Check whether this message is a response.
    pub fn is_response(&self) -> bool {
        self.qr
    }

    /// Set the query/response flag.
    pub fn set_response(&mut self, is_response: bool) {
        self.qr = is_response;
    }

    /// Get the operation code.
    pub fn opcode(&self) -> OpCode {
        self.opcode
    }

    /// Set the operation code.
    pub fn set_opcode(&mut self, opcode: OpCode) {
        self.opcode = opcode;
    }

    /// Check whether the authoritative answer flag is set.
    pub fn is_authoritative(&self) -> bool {
        self.aa
    }

    /// Set the authoritative answer flag.
    pub fn set_authoritative(&mut self, aa: bool) {
        self.aa = aa;
    }

    /// Check whether the truncation flag is set.
    pub fn is_truncated(&self) -> bool {
        self.tc
    }

    /// Set the truncation flag.
    pub fn set_truncated(&mut self, tc: bool) {
        self.tc = tc;
    }

    /// Check whether recursion is desired.
    pub fn recursion_desired(&self) -> bool {
        self.rd
    }

    /// Set the recursion desired flag.
    pub fn set_recursion_desired(&mut self, rd: bool) {
        self.rd = rd;
    }

    /// Check whether recursion is available.
    pub fn recursion_available(&self) -> bool {
        self.ra
    }

    /// Set the recursion available flag.
    pub fn set_recursion_available(&mut self, ra: bool) {
        self.ra = ra;
    }

    /// Get the response code.
    pub fn response_code(&self) -> ResponseCode {
        self.rcode
    }

    /// Set the response code.
    pub fn set_response_code(&mut self, rcode: ResponseCode) {
        self.rcode = rcode;
    }

    /// Get the question section.
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Add a question.
    pub fn add_question(&mut self, question: Question) {
        self.questions.push(question);
    }

    /// Get the answer section.
    pub fn answers(&self) -> &[ResourceRecord] {
        &self.answers
    }

    /// Add an answer record.
    pub fn add_answer(&mut self, answer: ResourceRecord) {
        self.answers.push(answer);
    }

    /// Get the authority section.
    pub fn authority(&self) -> &[ResourceRecord] {
        &self.authority
    }

    /// Add an authority record.
    pub fn add_authority(&mut self, record: ResourceRecord) {
        self.authority.push(record);
    }

    /// Get the additional section.
    pub fn additional(&self) -> &[ResourceRecord] {
        &self.additional
    }

    /// Add an additional record.
    pub fn add_additional(&mut self, record: ResourceRecord) {
        self.additional.push(record);
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Message[id={} {} {} questions={} answers={}]",
            self.id,
            if self.qr { "response" } else { "query" },
            self.rcode,
            self.questions.len(),
            self.answers.len(),
        )
    }
}
