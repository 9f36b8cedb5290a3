//! DNS wire format parsing and serialization
//!
//! Conversion between this crate's message model and the RFC 1035 binary
//! format, delegated to the hickory-proto library. The rest of the crate
//! never touches wire bytes directly.

use hickory_proto::op::{Message as WireMessage, MessageType, Query};
use hickory_proto::rr::{rdata, DNSClass, Name, RData as WireRData, Record as WireRecord};
use hickory_proto::serialize::binary::{BinDecodable, BinEncodable, BinEncoder};

use crate::dns::{
    Message, OpCode, Question, RData, RecordClass, RecordType, ResourceRecord, ResponseCode,
};
use crate::error::{Error, Result};

/// Parse a DNS message from wire format bytes.
pub fn parse_message(data: &[u8]) -> Result<Message> {
    let wire = WireMessage::from_bytes(data)
        .map_err(|e| Error::argument_caused("failed to parse DNS message", e))?;

    convert_from_wire(&wire)
}

/// Serialize a DNS message to wire format bytes.
pub fn serialize_message(message: &Message) -> Result<Vec<u8>> {
    let wire = convert_to_wire(message)?;

    let mut buffer = Vec::with_capacity(512);
    let mut encoder = BinEncoder::new(&mut buffer);
    wire.emit(&mut encoder)
        .map_err(|e| Error::internal_caused("failed to serialize DNS message", e))?;

    Ok(buffer)
}

fn convert_from_wire(wire: &WireMessage) -> Result<Message> {
    use hickory_proto::op::OpCode as WireOpCode;
    use hickory_proto::op::ResponseCode as WireResponseCode;

    let mut message = Message::new();

    message.set_id(wire.id());
    message.set_response(wire.message_type() == MessageType::Response);
    message.set_authoritative(wire.authoritative());
    message.set_truncated(wire.truncated());
    message.set_recursion_desired(wire.recursion_desired());
    message.set_recursion_available(wire.recursion_available());

    message.set_opcode(match wire.op_code() {
        WireOpCode::Query => OpCode::Query,
        WireOpCode::Status => OpCode::Status,
        WireOpCode::Notify => OpCode::Notify,
        WireOpCode::Update => OpCode::Update,
    });

    message.set_response_code(match wire.response_code() {
        WireResponseCode::NoError => ResponseCode::NoError,
        WireResponseCode::FormErr => ResponseCode::FormErr,
        WireResponseCode::ServFail => ResponseCode::ServFail,
        WireResponseCode::NXDomain => ResponseCode::NXDomain,
        WireResponseCode::NotImp => ResponseCode::NotImp,
        WireResponseCode::Refused => ResponseCode::Refused,
        other => ResponseCode::Unknown(other.low()),
    });

    for q in wire.queries() {
        let qtype = RecordType::from_u16(q.query_type().into());
        let qclass = RecordClass::from_u16(q.query_class().into());
        message.add_question(Question::new(q.name().to_utf8(), qtype, qclass));
    }

    for record in wire.answers() {
        message.add_answer(convert_wire_record(record));
    }
    for record in wire.name_servers() {
        message.add_authority(convert_wire_record(record));
    }
    for record in wire.additionals() {
        message.add_additional(convert_wire_record(record));
    }

    Ok(message)
}

fn convert_wire_record(record: &WireRecord) -> ResourceRecord {
    let name = record.name().to_utf8();
    let rtype = RecordType::from_u16(record.record_type().into());
    let rclass = RecordClass::from_u16(record.dns_class().into());
    let ttl = record.ttl();

    let rdata = match record.data() {
        Some(WireRData::A(a)) => RData::A(a.0),
        Some(WireRData::AAAA(aaaa)) => RData::AAAA(aaaa.0),
        Some(WireRData::NS(ns)) => RData::NS(ns.to_utf8()),
        Some(WireRData::CNAME(cname)) => RData::CNAME(cname.to_utf8()),
        Some(WireRData::PTR(ptr)) => RData::PTR(ptr.to_utf8()),
        Some(WireRData::MX(mx)) => RData::MX {
            preference: mx.preference(),
            exchange: mx.exchange().to_utf8(),
        },
        Some(WireRData::TXT(txt)) => {
            let text = txt
                .iter()
                .next()
                .map(|bytes| String::from_utf8_lossy(bytes).to_string())
                .unwrap_or_default();
            RData::TXT(text)
        }
        Some(WireRData::SRV(srv)) => RData::SRV {
            priority: srv.priority(),
            weight: srv.weight(),
            port: srv.port(),
            target: srv.target().to_utf8(),
        },
        _ => RData::Unknown(Vec::new()),
    };

    ResourceRecord::new(name, rtype, rclass, ttl, rdata)
}

fn convert_to_wire(message: &Message) -> Result<WireMessage> {
    use hickory_proto::op::OpCode as WireOpCode;
    use hickory_proto::op::ResponseCode as WireResponseCode;

    let mut wire = WireMessage::new();

    wire.set_id(message.id());
    wire.set_message_type(if message.is_response() {
        MessageType::Response
    } else {
        MessageType::Query
    });
    wire.set_authoritative(message.is_authoritative());
    wire.set_truncated(message.is_truncated());
    wire.set_recursion_desired(message.recursion_desired());
    wire.set_recursion_available(message.recursion_available());

    wire.set_op_code(match message.opcode() {
        OpCode::Query | OpCode::Unknown(_) => WireOpCode::Query,
        OpCode::Status => WireOpCode::Status,
        OpCode::Notify => WireOpCode::Notify,
        OpCode::Update => WireOpCode::Update,
    });

    wire.set_response_code(match message.response_code() {
        ResponseCode::NoError => WireResponseCode::NoError,
        ResponseCode::FormErr => WireResponseCode::FormErr,
        ResponseCode::ServFail => WireResponseCode::ServFail,
        ResponseCode::NXDomain => WireResponseCode::NXDomain,
        ResponseCode::NotImp => WireResponseCode::NotImp,
        ResponseCode::Refused => WireResponseCode::Refused,
        ResponseCode::Unknown(_) => WireResponseCode::ServFail,
    });

    for q in message.questions() {
        let name = parse_name(q.qname())?;
        let mut query = Query::query(name, q.qtype().to_u16().into());
        query.set_query_class(DNSClass::IN);
        wire.add_query(query);
    }

    for rr in message.answers() {
        wire.add_answer(convert_to_wire_record(rr)?);
    }
    for rr in message.authority() {
        wire.add_name_server(convert_to_wire_record(rr)?);
    }
    for rr in message.additional() {
        wire.add_additional(convert_to_wire_record(rr)?);
    }

    Ok(wire)
}

fn parse_name(name: &str) -> Result<Name> {
    Name::from_utf8(name).map_err(|e| Error::argument_caused("invalid domain name", e))
}

fn convert_to_wire_record(rr: &ResourceRecord) -> Result<WireRecord> {
    let name = parse_name(rr.name())?;

    let rdata = match rr.rdata() {
        RData::A(addr) => WireRData::A(rdata::A(*addr)),
        RData::AAAA(addr) => WireRData::AAAA(rdata::AAAA(*addr)),
        RData::NS(target) => WireRData::NS(rdata::NS(parse_name(target)?)),
        RData::CNAME(target) => WireRData::CNAME(rdata::CNAME(parse_name(target)?)),
        RData::PTR(target) => WireRData::PTR(rdata::PTR(parse_name(target)?)),
        RData::MX {
            preference,
            exchange,
        } => WireRData::MX(rdata::MX::new(*preference, parse_name(exchange)?)),
        RData::TXT(text) => WireRData::TXT(rdata::TXT::new(vec![text.clone()])),
        RData::SRV {
            priority,
            weight,
            port,
            target,
        } => WireRData::SRV(rdata::SRV::new(
            *priority,
            *weight,
            *port,
            parse_name(target)?,
        )),
        RData::Unknown(_) => {
            return Err(Error::argument(format!(
                "unsupported record type: {}",
                rr.rtype()
            )))
        }
    };

    Ok(WireRecord::from_rdata(name, rr.ttl(), rdata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn roundtrip_query() {
        let mut query = Message::new();
        query.set_id(1234);
        query.set_recursion_desired(true);
        query.add_question(Question::new("example.com.", RecordType::A, RecordClass::IN));

        let data = serialize_message(&query).expect("serialize query");
        assert!(data.len() >= 12);

        let parsed = parse_message(&data).expect("parse query");
        assert_eq!(parsed.id(), 1234);
        assert!(!parsed.is_response());
        assert!(parsed.recursion_desired());
        assert_eq!(parsed.questions().len(), 1);
        assert_eq!(parsed.questions()[0].qname(), "example.com.");
        assert_eq!(parsed.questions()[0].qtype(), RecordType::A);
    }

    #[test]
    fn roundtrip_response_with_answers() {
        let mut response = Message::new();
        response.set_id(5678);
        response.set_response(true);
        response.set_authoritative(true);
        response.set_recursion_available(true);
        response.add_question(Question::new("example.com.", RecordType::A, RecordClass::IN));
        response.add_answer(ResourceRecord::new(
            "example.com.",
            RecordType::A,
            RecordClass::IN,
            300,
            RData::A(Ipv4Addr::new(127, 0, 0, 2)),
        ));

        let data = serialize_message(&response).expect("serialize response");
        let parsed = parse_message(&data).expect("parse response");

        assert!(parsed.is_response());
        assert!(parsed.is_authoritative());
        assert!(parsed.recursion_available());
        assert_eq!(parsed.answers().len(), 1);

        let answer = &parsed.answers()[0];
        assert_eq!(answer.name(), "example.com.");
        assert_eq!(answer.ttl(), 300);
        assert_eq!(answer.rdata(), &RData::A(Ipv4Addr::new(127, 0, 0, 2)));
    }

    #[test]
    fn roundtrip_txt_and_srv() {
        let mut response = Message::new();
        response.set_id(1);
        response.set_response(true);
        response.add_answer(ResourceRecord::new(
            "example.com.",
            RecordType::TXT,
            RecordClass::IN,
            60,
            RData::TXT("hello world".to_string()),
        ));
        response.add_answer(ResourceRecord::new(
            "_http._tcp.example.com.",
            RecordType::SRV,
            RecordClass::IN,
            60,
            RData::SRV {
                priority: 1,
                weight: 2,
                port: 8080,
                target: "server.example.com.".to_string(),
            },
        ));

        let data = serialize_message(&response).expect("serialize");
        let parsed = parse_message(&data).expect("parse");

        assert_eq!(parsed.answers().len(), 2);
        assert_eq!(parsed.answers()[0].rdata(), &RData::TXT("hello world".to_string()));
        match parsed.answers()[1].rdata() {
            RData::SRV { port, target, .. } => {
                assert_eq!(*port, 8080);
                assert_eq!(target, "server.example.com.");
            }
            other => panic!("expected SRV rdata, got {:?}", other),
        }
    }

    #[test]
    fn serialize_unknown_rdata_fails() {
        let mut response = Message::new();
        response.set_response(true);
        response.add_answer(ResourceRecord::new(
            "example.com.",
            RecordType::Unknown(41),
            RecordClass::IN,
            0,
            RData::Unknown(Vec::new()),
        ));

        assert!(serialize_message(&response).is_err());
    }

    #[test]
    fn parse_garbage_fails() {
        assert!(parse_message(&[0u8; 5]).is_err());
    }
}
