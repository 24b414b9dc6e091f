use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use hickory_proto::op::{Message, ResponseCode};
use sans_application::ports::{PollutionProbe, ProbeVerdict, ResponseCache, UpstreamClient};
use sans_domain::{DomainError, Query, UpstreamGroup};

use super::messages::{answer, reply};

#[derive(Debug, Clone)]
pub enum Behaviour {
    Answer { ips: Vec<String>, delay: Duration },
    Rcode { rcode: ResponseCode, delay: Duration },
    /// Sleeps for the group timeout, then reports a timeout.
    Timeout,
    TransportError,
    /// Never completes; only deadline or abort ends it.
    Hang,
}

impl Behaviour {
    pub fn answer(ips: &[&str], delay_ms: u64) -> Self {
        Behaviour::Answer {
            ips: ips.iter().map(|s| s.to_string()).collect(),
            delay: Duration::from_millis(delay_ms),
        }
    }

    pub fn rcode(rcode: ResponseCode, delay_ms: u64) -> Self {
        Behaviour::Rcode {
            rcode,
            delay: Duration::from_millis(delay_ms),
        }
    }
}

/// Scripted upstream: behaviour is chosen per group name.
pub struct MockUpstreamClient {
    behaviours: RwLock<HashMap<String, Behaviour>>,
    calls: Mutex<Vec<String>>,
    completed: Arc<AtomicUsize>,
}

impl MockUpstreamClient {
    pub fn new() -> Self {
        Self {
            behaviours: RwLock::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            completed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn on(&self, group: &str, behaviour: Behaviour) -> &Self {
        self.behaviours
            .write()
            .unwrap()
            .insert(group.to_string(), behaviour);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

impl Default for MockUpstreamClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UpstreamClient for MockUpstreamClient {
    async fn send(
        &self,
        group: &UpstreamGroup,
        request: &Message,
    ) -> Result<Message, DomainError> {
        self.calls.lock().unwrap().push(group.name.to_string());
        let behaviour = self
            .behaviours
            .read()
            .unwrap()
            .get(group.name.as_ref())
            .cloned()
            .unwrap_or(Behaviour::Timeout);

        let result = match behaviour {
            Behaviour::Answer { ips, delay } => {
                tokio::time::sleep(delay).await;
                let ips: Vec<&str> = ips.iter().map(String::as_str).collect();
                Ok(answer(request, &ips))
            }
            Behaviour::Rcode { rcode, delay } => {
                tokio::time::sleep(delay).await;
                Ok(reply(request, rcode))
            }
            Behaviour::Timeout => {
                tokio::time::sleep(group.timeout).await;
                Err(DomainError::timeout(&group.name))
            }
            Behaviour::TransportError => {
                Err(DomainError::transport(&group.name, "connection refused"))
            }
            Behaviour::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        };

        self.completed.fetch_add(1, Ordering::SeqCst);
        result
    }
}

pub struct MockProbe {
    verdicts: RwLock<HashMap<String, ProbeVerdict>>,
    calls: AtomicUsize,
}

impl MockProbe {
    pub fn new() -> Self {
        Self {
            verdicts: RwLock::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, name: &str, verdict: ProbeVerdict) {
        self.verdicts
            .write()
            .unwrap()
            .insert(name.to_string(), verdict);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PollutionProbe for MockProbe {
    async fn probe(&self, name: &str) -> Result<ProbeVerdict, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.verdicts
            .read()
            .unwrap()
            .get(name)
            .copied()
            .ok_or_else(|| DomainError::timeout("probe"))
    }
}

/// Unbounded map keyed by name and type; no TTL handling.
#[derive(Default)]
pub struct MockCache {
    entries: Mutex<HashMap<(String, u16), Message>>,
}

impl ResponseCache for MockCache {
    fn get(&self, query: &Query) -> Option<Message> {
        self.entries
            .lock()
            .unwrap()
            .get(&(query.name.to_string(), query.record_type.to_u16()))
            .cloned()
    }

    fn insert(&self, query: &Query, response: &Message) {
        self.entries.lock().unwrap().insert(
            (query.name.to_string(), query.record_type.to_u16()),
            response.clone(),
        );
    }

    fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}
