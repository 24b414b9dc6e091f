use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Malformed DNS message: {reason}")]
    Decode { reason: String },

    #[error("Failed to encode DNS message: {0}")]
    Encode(String),

    #[error("Timeout waiting for {server}")]
    Timeout { server: String },

    #[error("Transport failure with {server}: {reason}")]
    Transport { server: String, reason: String },

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Upstream group has no reachable endpoint: {0}")]
    NoUpstream(String),
}

impl DomainError {
    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }

    pub fn timeout(server: impl ToString) -> Self {
        Self::Timeout {
            server: server.to_string(),
        }
    }

    pub fn transport(server: impl ToString, reason: impl ToString) -> Self {
        Self::Transport {
            server: server.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Per-upstream failures that are recovered locally by the dispatcher.
    pub fn is_upstream_failure(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Transport { .. } | Self::Decode { .. } | Self::NoUpstream(_)
        )
    }
}

impl From<crate::config::ConfigError> for DomainError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::ConfigInvalid(err.to_string())
    }
}
