//! DNS wire format.
//!
//! Thin layer over `hickory-proto` that turns parse failures into
//! [`DecodeError`] instead of propagating panics or partial messages, and
//! shapes responses to fit a UDP client's advertised payload size.

pub mod frame;

pub use frame::{DnsFrameCodec, FrameError, DEFAULT_MAX_FRAME_LEN};

use hickory_proto::op::{Message, MessageType};
use sans_domain::DomainError;
use thiserror::Error;

/// Fixed DNS header length; anything shorter cannot be a message.
pub const HEADER_LEN: usize = 12;

/// Payload limit for clients that do not advertise EDNS.
pub const MIN_UDP_PAYLOAD: usize = 512;

/// Upper bound honoured for EDNS-advertised payload sizes.
pub const MAX_UDP_PAYLOAD: usize = 4096;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct DecodeError {
    pub reason: String,
}

impl DecodeError {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl From<DecodeError> for DomainError {
    fn from(err: DecodeError) -> Self {
        DomainError::decode(err.reason)
    }
}

pub struct MessageCodec;

impl MessageCodec {
    pub fn decode(bytes: &[u8]) -> Result<Message, DecodeError> {
        if bytes.len() < HEADER_LEN {
            return Err(DecodeError::new(format!(
                "message too short: {} bytes",
                bytes.len()
            )));
        }
        Message::from_vec(bytes).map_err(|e| DecodeError::new(e.to_string()))
    }

    pub fn encode(message: &Message) -> Result<Vec<u8>, DomainError> {
        message
            .to_vec()
            .map_err(|e| DomainError::Encode(e.to_string()))
    }

    /// Payload size the client can receive over UDP.
    pub fn udp_payload_limit(request: &Message) -> usize {
        let advertised = request
            .extensions()
            .as_ref()
            .map(|edns| edns.max_payload() as usize)
            .unwrap_or(MIN_UDP_PAYLOAD);
        advertised.clamp(MIN_UDP_PAYLOAD, MAX_UDP_PAYLOAD)
    }

    /// Encodes `response` for a UDP client. If it does not fit in `limit`,
    /// only the header and question are sent with TC set.
    pub fn encode_for_udp(response: &Message, limit: usize) -> Result<Vec<u8>, DomainError> {
        let bytes = Self::encode(response)?;
        if bytes.len() <= limit {
            return Ok(bytes);
        }
        Self::encode(&Self::truncated(response))
    }

    pub fn truncated(response: &Message) -> Message {
        let mut header_only = Message::new();
        header_only
            .set_id(response.id())
            .set_message_type(MessageType::Response)
            .set_op_code(response.op_code())
            .set_recursion_desired(response.recursion_desired())
            .set_recursion_available(response.recursion_available())
            .set_response_code(response.response_code())
            .set_truncated(true)
            .add_queries(response.queries().to_vec());
        header_only
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::op::{Edns, OpCode, Query};
    use hickory_proto::rr::{Name, RecordType};
    use std::str::FromStr;

    fn request() -> Message {
        let mut message = Message::new();
        message
            .set_id(7)
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Query)
            .set_recursion_desired(true)
            .add_query(Query::query(
                Name::from_str("example.com.").unwrap(),
                RecordType::A,
            ));
        message
    }

    #[test]
    fn test_short_input_rejected() {
        assert!(MessageCodec::decode(&[]).is_err());
        assert!(MessageCodec::decode(&[0u8; 11]).is_err());
    }

    #[test]
    fn test_garbage_is_a_decode_error() {
        let mut bytes = vec![0xffu8; 40];
        bytes[4] = 0x00;
        bytes[5] = 0x05;
        assert!(MessageCodec::decode(&bytes).is_err());
    }

    #[test]
    fn test_payload_limit_without_edns() {
        assert_eq!(MessageCodec::udp_payload_limit(&request()), MIN_UDP_PAYLOAD);
    }

    #[test]
    fn test_payload_limit_is_capped() {
        let mut req = request();
        let mut edns = Edns::new();
        edns.set_max_payload(65000);
        req.set_edns(edns);
        assert_eq!(MessageCodec::udp_payload_limit(&req), MAX_UDP_PAYLOAD);
    }

    #[test]
    fn test_truncated_keeps_header_and_question() {
        let mut response = request();
        response.set_message_type(MessageType::Response);
        let header_only = MessageCodec::truncated(&response);
        assert!(header_only.truncated());
        assert_eq!(header_only.id(), 7);
        assert_eq!(header_only.queries().len(), 1);
        assert!(header_only.answers().is_empty());
    }
}
