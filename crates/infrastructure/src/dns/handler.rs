//! Wire-level query handling shared by the UDP and TCP listeners.
//!
//! Bytes in, bytes out: decode, hand the question to the dispatcher, encode
//! whatever it resolved. `None` means nothing is written back, which is the
//! outcome for malformed input, timeouts and failures alike.

use hickory_proto::op::{Message, MessageType, OpCode};
use sans_application::use_cases::ResolveQueryUseCase;
use sans_domain::{Query, QueryOrigin, RecordType};
use std::sync::Arc;
use tracing::debug;

use super::codec::MessageCodec;

#[derive(Clone)]
pub struct DnsHandler {
    use_case: Arc<ResolveQueryUseCase>,
}

impl DnsHandler {
    pub fn new(use_case: Arc<ResolveQueryUseCase>) -> Self {
        Self { use_case }
    }

    pub fn use_case(&self) -> &Arc<ResolveQueryUseCase> {
        &self.use_case
    }

    pub async fn handle(&self, bytes: &[u8], origin: QueryOrigin) -> Option<Vec<u8>> {
        let peer = origin.peer();
        let request = match MessageCodec::decode(bytes) {
            Ok(message) => message,
            Err(e) => {
                debug!(peer = %peer, error = %e, "Dropping malformed query");
                return None;
            }
        };

        let query = Self::parse_query(&request, origin)?;
        let udp_limit = query
            .origin
            .is_udp()
            .then(|| MessageCodec::udp_payload_limit(&request));

        let response = self.use_case.execute(&query, &request).await.into_response()?;

        let encoded = match udp_limit {
            Some(limit) => MessageCodec::encode_for_udp(&response, limit),
            None => MessageCodec::encode(&response),
        };
        match encoded {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                debug!(peer = %peer, domain = %query.name, error = %e, "Dropping unencodable response");
                None
            }
        }
    }

    /// Only standard queries with exactly one question are served.
    fn parse_query(request: &Message, origin: QueryOrigin) -> Option<Query> {
        if request.message_type() != MessageType::Query || request.op_code() != OpCode::Query {
            debug!(peer = %origin.peer(), "Dropping non-query message");
            return None;
        }

        let [question] = request.queries() else {
            debug!(
                peer = %origin.peer(),
                questions = request.queries().len(),
                "Dropping query without exactly one question"
            );
            return None;
        };

        Some(Query::new(
            request.id(),
            &question.name().to_ascii(),
            RecordType::from_u16(u16::from(question.query_type())),
            u16::from(question.query_class()),
            origin,
        ))
    }
}
