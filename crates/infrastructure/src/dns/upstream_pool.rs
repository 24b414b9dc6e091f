//! Upstream Client Pool: one `send` per upstream group.
//!
//! Each call re-stamps the request with a fresh transaction id, so
//! concurrent queries to the same server never cross-talk, and then
//! either races every endpoint of the group (parallel) or walks them in
//! order (failover). The group timeout bounds the whole call.

use async_trait::async_trait;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use hickory_proto::op::{Message, MessageType};
use sans_application::ports::UpstreamClient;
use sans_domain::{DomainError, UpstreamEndpoint, UpstreamGroup, UpstreamStrategy};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::codec::MessageCodec;
use super::transport::udp::DEFAULT_RETRANSMIT;
use super::transport::{create_transport, tcp::TcpTransport, Transport};

pub struct UpstreamPool {
    udp_retransmit: Duration,
}

impl UpstreamPool {
    pub fn new(udp_retransmit: Duration) -> Self {
        Self { udp_retransmit }
    }

    async fn race(
        &self,
        group: &UpstreamGroup,
        bytes: &[u8],
        id: u16,
        deadline: Instant,
    ) -> Result<Message, DomainError> {
        let mut futs: FuturesUnordered<_> = group
            .endpoints
            .iter()
            .map(|endpoint| self.exchange(group, endpoint, bytes, id, deadline))
            .collect();

        let mut last_error = None;
        while let Some(result) = futs.next().await {
            match result {
                Ok(message) => return Ok(message),
                Err(e) => {
                    debug!(group = %group.name, error = %e, "Endpoint failed");
                    last_error = Some(merge_errors(last_error, e));
                }
            }
        }
        Err(last_error.unwrap_or_else(|| DomainError::NoUpstream(group.name.to_string())))
    }

    async fn failover(
        &self,
        group: &UpstreamGroup,
        bytes: &[u8],
        id: u16,
        deadline: Instant,
    ) -> Result<Message, DomainError> {
        let total = group.endpoints.len();
        let mut last_error = None;

        for (i, endpoint) in group.endpoints.iter().enumerate() {
            // Split what is left evenly among the endpoints not yet tried.
            let remaining = deadline.saturating_duration_since(Instant::now());
            let share = remaining / (total - i) as u32;
            let attempt_deadline = Instant::now() + share;

            match self.exchange(group, endpoint, bytes, id, attempt_deadline).await {
                Ok(message) => return Ok(message),
                Err(e) => {
                    debug!(group = %group.name, server = %endpoint, error = %e, "Endpoint failed, trying next");
                    last_error = Some(merge_errors(last_error, e));
                }
            }
        }
        Err(last_error.unwrap_or_else(|| DomainError::NoUpstream(group.name.to_string())))
    }

    async fn exchange(
        &self,
        group: &UpstreamGroup,
        endpoint: &UpstreamEndpoint,
        bytes: &[u8],
        id: u16,
        deadline: Instant,
    ) -> Result<Message, DomainError> {
        let transport = create_transport(endpoint, group.socks5, self.udp_retransmit);
        let message = Self::ask(&transport, endpoint, bytes, id, deadline).await?;

        if message.truncated() && transport.is_udp() {
            debug!(server = %endpoint, "Truncated UDP reply, retrying over TCP");
            let tcp = Transport::Tcp(TcpTransport::new(endpoint.socket_addr()));
            return Self::ask(&tcp, endpoint, bytes, id, deadline).await;
        }

        Ok(message)
    }

    async fn ask(
        transport: &Transport,
        endpoint: &UpstreamEndpoint,
        bytes: &[u8],
        id: u16,
        deadline: Instant,
    ) -> Result<Message, DomainError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(DomainError::timeout(endpoint));
        }

        let response = transport.send(bytes, remaining).await?;
        let message = MessageCodec::decode(&response.bytes)?;

        if message.id() != id {
            return Err(DomainError::decode(format!(
                "reply from {} carries id {} instead of {}",
                endpoint,
                message.id(),
                id
            )));
        }
        if message.message_type() != MessageType::Response {
            return Err(DomainError::decode(format!("reply from {endpoint} is not a response")));
        }

        debug!(
            server = %endpoint,
            protocol = response.protocol_used,
            rcode = %message.response_code(),
            answers = message.answers().len(),
            "Upstream reply"
        );
        Ok(message)
    }
}

impl Default for UpstreamPool {
    fn default() -> Self {
        Self::new(DEFAULT_RETRANSMIT)
    }
}

#[async_trait]
impl UpstreamClient for UpstreamPool {
    async fn send(&self, group: &UpstreamGroup, request: &Message) -> Result<Message, DomainError> {
        if group.endpoints.is_empty() {
            return Err(DomainError::NoUpstream(group.name.to_string()));
        }

        let id = next_transaction_id();
        let mut outbound = request.clone();
        outbound.set_id(id);
        let bytes = MessageCodec::encode(&outbound)?;

        let deadline = Instant::now() + group.timeout;
        debug!(
            group = %group.name,
            strategy = group.strategy.as_str(),
            endpoints = group.endpoints.len(),
            "Sending to upstream group"
        );

        match group.strategy {
            UpstreamStrategy::Parallel => self.race(group, &bytes, id, deadline).await,
            UpstreamStrategy::Failover => self.failover(group, &bytes, id, deadline).await,
        }
    }
}

/// Random, never zero.
pub fn next_transaction_id() -> u16 {
    fastrand::u16(1..)
}

/// Keeps a timeout only when nothing more specific went wrong.
fn merge_errors(previous: Option<DomainError>, next: DomainError) -> DomainError {
    match previous {
        Some(prev) if next.is_timeout() && !prev.is_timeout() => prev,
        _ => next,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_ids_are_never_zero() {
        for _ in 0..10_000 {
            assert_ne!(next_transaction_id(), 0);
        }
    }

    #[test]
    fn test_merge_prefers_specific_errors() {
        let refused = DomainError::transport("1.1.1.1:53", "refused");
        let timeout = DomainError::timeout("8.8.8.8:53");
        assert_eq!(
            merge_errors(Some(refused.clone()), timeout.clone()),
            refused
        );
        assert_eq!(merge_errors(Some(timeout), refused.clone()), refused);
    }

    #[tokio::test]
    async fn test_empty_group_is_no_upstream() {
        let pool = UpstreamPool::default();
        let group = UpstreamGroup::new(0, "empty", Vec::new());
        let err = pool.send(&group, &Message::new()).await.unwrap_err();
        assert!(matches!(err, DomainError::NoUpstream(_)));
    }
}
