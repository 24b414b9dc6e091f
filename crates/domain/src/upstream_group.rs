use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::UpstreamEndpoint;

/// Index of a group inside the loaded configuration snapshot.
pub type GroupId = usize;

/// How the endpoints inside one group are used for a single send.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamStrategy {
    /// Race every endpoint, first decoded reply wins.
    Parallel,

    /// Try endpoints in declaration order until one replies.
    #[default]
    Failover,
}

impl UpstreamStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parallel => "parallel",
            Self::Failover => "failover",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamGroup {
    pub id: GroupId,
    pub name: Arc<str>,
    pub endpoints: Vec<UpstreamEndpoint>,
    pub timeout: Duration,
    /// Higher is more trusted by the answer arbiter.
    pub trust: u8,
    pub strategy: UpstreamStrategy,
    pub socks5: Option<SocketAddr>,
}

impl UpstreamGroup {
    pub fn new(id: GroupId, name: impl Into<Arc<str>>, endpoints: Vec<UpstreamEndpoint>) -> Self {
        Self {
            id,
            name: name.into(),
            endpoints,
            timeout: Duration::from_millis(crate::config::DEFAULT_GROUP_TIMEOUT_MS),
            trust: 1,
            strategy: UpstreamStrategy::default(),
            socks5: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_trust(mut self, trust: u8) -> Self {
        self.trust = trust;
        self
    }

    pub fn with_strategy(mut self, strategy: UpstreamStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_socks5(mut self, proxy: Option<SocketAddr>) -> Self {
        self.socks5 = proxy;
        self
    }
}
