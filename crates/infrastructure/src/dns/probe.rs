//! Pollution probe.
//!
//! Asks a reference resolver for the SOA of a name. A poisoning middlebox
//! answers everything it intercepts with a forged A record, so an A record
//! in reply to an SOA question marks the name as polluted. Up to
//! `max_verdicts` verdicts are remembered for the life of the process;
//! failures are not.

use async_trait::async_trait;
use compact_str::CompactString;
use dashmap::DashMap;
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{Name, RecordType};
use rustc_hash::FxBuildHasher;
use sans_application::ports::{PollutionProbe, ProbeVerdict};
use sans_domain::{DomainError, ProbeTargets};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::debug;

use super::codec::MessageCodec;
use super::transport::udp::UdpTransport;
use super::transport::DnsTransport;
use super::upstream_pool::next_transaction_id;

pub const DEFAULT_MAX_VERDICTS: usize = 4096;

pub struct SoaPollutionProbe {
    transport: UdpTransport,
    timeout: Duration,
    verdicts: DashMap<CompactString, ProbeVerdict, FxBuildHasher>,
    max_verdicts: usize,
}

impl SoaPollutionProbe {
    pub fn new(server: SocketAddr, timeout: Duration, udp_retransmit: Duration) -> Self {
        Self {
            transport: UdpTransport::new(server).with_retransmit(udp_retransmit),
            timeout,
            verdicts: DashMap::with_hasher(FxBuildHasher),
            max_verdicts: DEFAULT_MAX_VERDICTS,
        }
    }

    pub fn with_max_verdicts(mut self, max_verdicts: usize) -> Self {
        self.max_verdicts = max_verdicts;
        self
    }

    pub fn from_targets(targets: &ProbeTargets, udp_retransmit: Duration) -> Self {
        Self::new(targets.server, targets.timeout, udp_retransmit)
            .with_max_verdicts(targets.max_verdicts)
    }

    pub fn learned(&self) -> usize {
        self.verdicts.len()
    }

    pub fn verdict_for(&self, name: &str) -> Option<ProbeVerdict> {
        self.verdicts.get(name).map(|v| *v)
    }

    /// Once `max_verdicts` names are stored, new names are answered but
    /// not remembered.
    fn remember(&self, name: &str, verdict: ProbeVerdict) {
        if self.verdicts.len() >= self.max_verdicts && !self.verdicts.contains_key(name) {
            debug!(domain = %name, max_verdicts = self.max_verdicts, "Probe verdict store full");
            return;
        }
        debug!(domain = %name, verdict = verdict.as_str(), "Learned probe verdict");
        self.verdicts.insert(CompactString::from(name), verdict);
    }

    fn soa_question(name: &str, id: u16) -> Result<Message, DomainError> {
        let fqdn = Name::from_ascii(format!("{name}."))
            .map_err(|e| DomainError::Encode(format!("invalid name '{name}': {e}")))?;
        let mut message = Message::new();
        message
            .set_id(id)
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Query)
            .set_recursion_desired(true)
            .add_query(Query::query(fqdn, RecordType::SOA));
        Ok(message)
    }
}

/// An A record leading the answer section of an SOA reply is forged.
pub fn classify_soa_reply(reply: &Message) -> ProbeVerdict {
    match reply.answers().first() {
        Some(record) if record.record_type() == RecordType::A => ProbeVerdict::Polluted,
        _ => ProbeVerdict::Clean,
    }
}

#[async_trait]
impl PollutionProbe for SoaPollutionProbe {
    async fn probe(&self, name: &str) -> Result<ProbeVerdict, DomainError> {
        if let Some(verdict) = self.verdict_for(name) {
            return Ok(verdict);
        }

        let id = next_transaction_id();
        let bytes = MessageCodec::encode(&Self::soa_question(name, id)?)?;
        let response = self.transport.send(&bytes, self.timeout).await?;
        let reply = MessageCodec::decode(&response.bytes)?;

        let verdict = classify_soa_reply(&reply);
        self.remember(name, verdict);
        Ok(verdict)
    }
}
