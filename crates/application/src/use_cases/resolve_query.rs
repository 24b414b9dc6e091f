use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use hickory_proto::op::{Message, ResponseCode};
use sans_domain::{GroupId, Query, RuntimeSnapshot, UpstreamGroup};
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::metrics::DispatchMetrics;
use crate::ports::{PollutionProbe, ProbeVerdict, ResponseCache, UpstreamClient};
use crate::services::{AnswerArbiter, CandidateAnswer, DomainClassifier, GroupList, Verdict};

/// Lifecycle of one in-flight query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Received,
    Dispatched,
    Resolved,
    TimedOut,
    Failed,
}

#[derive(Debug, Clone)]
pub struct Resolution {
    /// Ready to encode: carries the client's transaction id.
    pub response: Message,
    pub group: Option<Arc<str>>,
    pub cache_hit: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// Every reply was a server failure or poisoned.
    AllRejected,
    /// Every send failed with a transport or decode error.
    UpstreamErrors,
    NoGroups,
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Resolved(Resolution),
    TimedOut,
    Failed(FailureReason),
}

impl Outcome {
    pub fn state(&self) -> QueryState {
        match self {
            Outcome::Resolved(_) => QueryState::Resolved,
            Outcome::TimedOut => QueryState::TimedOut,
            Outcome::Failed(_) => QueryState::Failed,
        }
    }

    pub fn into_response(self) -> Option<Message> {
        match self {
            Outcome::Resolved(resolution) => Some(resolution.response),
            Outcome::TimedOut | Outcome::Failed(_) => None,
        }
    }
}

struct ProbeRoutes {
    probe: Arc<dyn PollutionProbe>,
    polluted: GroupList,
    clean: GroupList,
}

/// The resolution dispatcher: classify, fan out to every matched group
/// concurrently, arbitrate, and abandon whatever is still outstanding.
pub struct ResolveQueryUseCase {
    groups: Arc<[Arc<UpstreamGroup>]>,
    classifier: Arc<DomainClassifier>,
    arbiter: Arc<AnswerArbiter>,
    upstream: Arc<dyn UpstreamClient>,
    probe: Option<ProbeRoutes>,
    cache: Option<Arc<dyn ResponseCache>>,
    metrics: Arc<DispatchMetrics>,
    deadline: Duration,
}

impl ResolveQueryUseCase {
    pub fn new(snapshot: &RuntimeSnapshot, upstream: Arc<dyn UpstreamClient>) -> Self {
        let groups: Arc<[Arc<UpstreamGroup>]> =
            snapshot.groups.iter().cloned().map(Arc::new).collect();
        Self {
            groups,
            classifier: Arc::new(DomainClassifier::new(
                &snapshot.rules,
                snapshot.default_group,
            )),
            arbiter: Arc::new(AnswerArbiter::new(Arc::new(snapshot.poison.clone()))),
            upstream,
            probe: None,
            cache: None,
            metrics: Arc::new(DispatchMetrics::new()),
            deadline: snapshot.query_deadline,
        }
    }

    /// Only takes effect when the snapshot has probe targets configured.
    pub fn with_probe(mut self, snapshot: &RuntimeSnapshot, probe: Arc<dyn PollutionProbe>) -> Self {
        self.probe = snapshot.probe.as_ref().map(|targets| ProbeRoutes {
            probe,
            polluted: targets.polluted.iter().copied().collect(),
            clean: targets.clean.iter().copied().collect(),
        });
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<DispatchMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn metrics(&self) -> &Arc<DispatchMetrics> {
        &self.metrics
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub async fn execute(&self, query: &Query, request: &Message) -> Outcome {
        self.metrics.record_received();
        trace!(id = query.id, domain = %query.name, state = ?QueryState::Received);

        if let Some(resolution) = self.lookup_cache(query) {
            self.metrics.record_cache_hit();
            self.metrics.record_resolved();
            debug!(domain = %query.name, record_type = %query.record_type, "Cache hit");
            return Outcome::Resolved(resolution);
        }

        let groups = self.route(query).await;
        let outcome = self.dispatch(query, request, &groups).await;

        match &outcome {
            Outcome::Resolved(resolution) => {
                self.metrics.record_resolved();
                self.store_cache(query, &resolution.response);
                debug!(
                    domain = %query.name,
                    record_type = %query.record_type,
                    group = resolution.group.as_deref().unwrap_or("-"),
                    elapsed_ms = query.received_at.elapsed().as_millis() as u64,
                    "Query resolved"
                );
            }
            Outcome::TimedOut => {
                self.metrics.record_timed_out();
                debug!(domain = %query.name, deadline_ms = self.deadline.as_millis() as u64, "Query timed out");
            }
            Outcome::Failed(reason) => {
                self.metrics.record_failed();
                debug!(domain = %query.name, reason = ?reason, "Query failed");
            }
        }

        outcome
    }

    async fn route(&self, query: &Query) -> GroupList {
        let classification = self.classifier.classify_canonical(&query.name);
        if !classification.is_default() || query.is_reverse_lookup() || query.name.is_empty() {
            return dedup(classification.groups);
        }

        let Some(routes) = &self.probe else {
            return classification.groups;
        };

        self.metrics.record_probe();
        match routes.probe.probe(&query.name).await {
            Ok(verdict) => {
                debug!(domain = %query.name, verdict = verdict.as_str(), "Probe verdict");
                match verdict {
                    ProbeVerdict::Polluted => dedup(routes.polluted.clone()),
                    ProbeVerdict::Clean => dedup(routes.clean.clone()),
                }
            }
            Err(e) => {
                debug!(domain = %query.name, error = %e, "Probe failed, using default group");
                classification.groups
            }
        }
    }

    async fn dispatch(&self, query: &Query, request: &Message, groups: &[GroupId]) -> Outcome {
        let targets: SmallVec<[Arc<UpstreamGroup>; 4]> = groups
            .iter()
            .filter_map(|id| self.groups.get(*id).cloned())
            .collect();
        if targets.is_empty() {
            return Outcome::Failed(FailureReason::NoGroups);
        }

        trace!(id = query.id, groups = targets.len(), state = ?QueryState::Dispatched);

        let mut abort_handles = Vec::with_capacity(targets.len());
        let mut futs = FuturesUnordered::new();
        let mut pending: SmallVec<[(GroupId, u8); 4]> = SmallVec::new();

        for group in targets {
            pending.push((group.id, group.trust));
            let upstream = Arc::clone(&self.upstream);
            let request = request.clone();
            let handle = tokio::spawn(async move {
                let result = upstream.send(&group, &request).await;
                (group, result, Instant::now())
            });
            abort_handles.push(handle.abort_handle());
            futs.push(handle);
        }

        let deadline = tokio::time::sleep(self.deadline);
        tokio::pin!(deadline);

        let mut retained: Vec<CandidateAnswer> = Vec::new();
        let mut errors = 0usize;
        let mut timeouts = 0usize;
        let mut deadline_hit = false;

        loop {
            tokio::select! {
                joined = futs.next() => {
                    let Some(joined) = joined else { break };
                    let (group, result, arrived_at) = match joined {
                        Ok(r) => r,
                        Err(e) => {
                            warn!(error = %e, "Upstream task panicked");
                            errors += 1;
                            continue;
                        }
                    };
                    if let Some(pos) = pending.iter().position(|(id, _)| *id == group.id) {
                        pending.swap_remove(pos);
                    }

                    match result {
                        Ok(message) => {
                            let candidate = self.arbiter.candidate(&group, message, arrived_at);
                            if let Verdict::Poisoned(ip) = candidate.verdict {
                                self.metrics.record_poisoned();
                                warn!(domain = %query.name, group = %group.name, address = %ip, "Poisoned answer rejected");
                            }
                            let accept_now = candidate.verdict.is_valid()
                                && !pending.iter().any(|(_, trust)| *trust > candidate.trust);
                            retained.push(candidate);
                            if accept_now {
                                break;
                            }
                        }
                        Err(e) => {
                            if e.is_timeout() {
                                timeouts += 1;
                            } else {
                                errors += 1;
                            }
                            debug!(domain = %query.name, group = %group.name, error = %e, "Upstream group failed");
                        }
                    }
                }
                _ = &mut deadline => {
                    deadline_hit = true;
                    break;
                }
            }
        }

        // Outstanding sends are abandoned; their replies never reach us.
        self.metrics.record_stragglers(futs.len() as u64);
        for handle in &abort_handles {
            handle.abort();
        }

        let had_replies = !retained.is_empty();
        match self.arbiter.choose(retained) {
            Some(chosen) => {
                let mut response = chosen.message;
                response.set_id(query.id);
                Outcome::Resolved(Resolution {
                    response,
                    group: Some(chosen.group_name),
                    cache_hit: false,
                })
            }
            None if had_replies => Outcome::Failed(FailureReason::AllRejected),
            None if deadline_hit || (timeouts > 0 && errors == 0) => Outcome::TimedOut,
            None => Outcome::Failed(FailureReason::UpstreamErrors),
        }
    }

    fn lookup_cache(&self, query: &Query) -> Option<Resolution> {
        let cache = self.cache.as_ref()?;
        let mut response = cache.get(query)?;
        response.set_id(query.id);
        Some(Resolution {
            response,
            group: None,
            cache_hit: true,
        })
    }

    fn store_cache(&self, query: &Query, response: &Message) {
        if let Some(cache) = &self.cache {
            if matches!(
                response.response_code(),
                ResponseCode::NoError | ResponseCode::NXDomain
            ) && !response.truncated()
            {
                cache.insert(query, response);
            }
        }
    }
}

fn dedup(mut groups: GroupList) -> GroupList {
    let mut seen: SmallVec<[GroupId; 4]> = SmallVec::new();
    groups.retain(|id| {
        if seen.contains(id) {
            false
        } else {
            seen.push(*id);
            true
        }
    });
    groups
}
