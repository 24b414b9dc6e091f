use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::errors::ConfigError;
use crate::{GroupId, UpstreamEndpoint, UpstreamGroup, UpstreamStrategy};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamGroupConfig {
    pub name: String,

    /// `udp://IP:PORT`, `tcp://IP:PORT`, `IP:PORT` or bare `IP`.
    pub servers: Vec<String>,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_trust")]
    pub trust: u8,

    #[serde(default)]
    pub strategy: UpstreamStrategy,

    #[serde(default)]
    pub socks5: Option<SocketAddr>,
}

impl UpstreamGroupConfig {
    pub fn new(name: impl Into<String>, servers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            servers,
            timeout_ms: default_timeout_ms(),
            trust: default_trust(),
            strategy: UpstreamStrategy::default(),
            socks5: None,
        }
    }

    pub fn to_group(&self, id: GroupId) -> Result<UpstreamGroup, ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::Validation(format!(
                "Group '{}': timeout_ms cannot be 0",
                self.name
            )));
        }

        let endpoints = self
            .servers
            .iter()
            .map(|s| {
                s.parse::<UpstreamEndpoint>().map_err(|e| {
                    ConfigError::Validation(format!("Group '{}': {}", self.name, e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(UpstreamGroup::new(id, self.name.as_str(), endpoints)
            .with_timeout(Duration::from_millis(self.timeout_ms))
            .with_trust(self.trust)
            .with_strategy(self.strategy)
            .with_socks5(self.socks5))
    }
}

fn default_timeout_ms() -> u64 {
    super::DEFAULT_GROUP_TIMEOUT_MS
}

fn default_trust() -> u8 {
    1
}
