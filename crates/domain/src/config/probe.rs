use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// Pollution probe for names no rule covers.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProbeConfig {
    #[serde(default)]
    pub enabled: bool,

    /// A resolver reached across the poisoned path.
    #[serde(default = "default_probe_server")]
    pub server: SocketAddr,

    #[serde(default = "default_probe_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub polluted_groups: Vec<String>,

    #[serde(default)]
    pub clean_groups: Vec<String>,

    /// Names whose verdict is remembered; later names are probed every time.
    #[serde(default = "default_max_verdicts")]
    pub max_verdicts: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            server: default_probe_server(),
            timeout_ms: default_probe_timeout_ms(),
            polluted_groups: Vec::new(),
            clean_groups: Vec::new(),
            max_verdicts: default_max_verdicts(),
        }
    }
}

pub(crate) fn default_probe_server() -> SocketAddr {
    SocketAddr::from(([8, 8, 8, 8], 53))
}

fn default_probe_timeout_ms() -> u64 {
    1000
}

fn default_max_verdicts() -> usize {
    4096
}
