use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::rr::RData;
use sans_domain::{GroupId, PoisonFilter, UpstreamGroup};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    ServerFailure(ResponseCode),
    Poisoned(IpAddr),
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid)
    }
}

/// One upstream group's reply to one query. Lives only as long as the
/// dispatcher handling that query.
#[derive(Debug, Clone)]
pub struct CandidateAnswer {
    pub group: GroupId,
    pub group_name: Arc<str>,
    pub trust: u8,
    pub message: Message,
    pub arrived_at: Instant,
    pub verdict: Verdict,
}

pub struct AnswerArbiter {
    poison: Arc<PoisonFilter>,
}

impl AnswerArbiter {
    pub fn new(poison: Arc<PoisonFilter>) -> Self {
        Self { poison }
    }

    /// Server failures first, then forged addresses in the answer section.
    pub fn judge(&self, message: &Message) -> Verdict {
        let rcode = message.response_code();
        if is_server_failure(rcode) {
            return Verdict::ServerFailure(rcode);
        }

        for record in message.answers() {
            let ip = match record.data() {
                Some(RData::A(a)) => IpAddr::V4(a.0),
                Some(RData::AAAA(aaaa)) => IpAddr::V6(aaaa.0),
                _ => continue,
            };
            if self.poison.is_poisoned(ip) {
                return Verdict::Poisoned(ip);
            }
        }

        Verdict::Valid
    }

    pub fn candidate(
        &self,
        group: &UpstreamGroup,
        message: Message,
        arrived_at: Instant,
    ) -> CandidateAnswer {
        let verdict = self.judge(&message);
        CandidateAnswer {
            group: group.id,
            group_name: Arc::clone(&group.name),
            trust: group.trust,
            message,
            arrived_at,
            verdict,
        }
    }

    /// Keeps valid candidates, then prefers the highest trust and, among
    /// equals, the earliest arrival. `None` when nothing survives.
    pub fn choose(&self, candidates: Vec<CandidateAnswer>) -> Option<CandidateAnswer> {
        candidates
            .into_iter()
            .filter(|candidate| {
                if !candidate.verdict.is_valid() {
                    debug!(
                        group = %candidate.group_name,
                        verdict = ?candidate.verdict,
                        "Candidate discarded"
                    );
                }
                candidate.verdict.is_valid()
            })
            .reduce(|best, candidate| {
                let better = candidate.trust > best.trust
                    || (candidate.trust == best.trust && candidate.arrived_at < best.arrived_at);
                if better {
                    candidate
                } else {
                    best
                }
            })
    }
}

pub fn is_server_failure(rcode: ResponseCode) -> bool {
    matches!(
        rcode,
        ResponseCode::ServFail | ResponseCode::Refused | ResponseCode::NotImp
    )
}
