use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// UDP and TCP listeners share this address.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    #[serde(default = "default_tcp_idle_timeout_ms")]
    pub tcp_idle_timeout_ms: u64,

    /// Queries in flight per TCP connection before reads pause.
    #[serde(default = "default_tcp_max_inflight")]
    pub tcp_max_inflight: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            tcp_idle_timeout_ms: default_tcp_idle_timeout_ms(),
            tcp_max_inflight: default_tcp_max_inflight(),
        }
    }
}

pub(crate) fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 53))
}

fn default_tcp_idle_timeout_ms() -> u64 {
    10_000
}

fn default_tcp_max_inflight() -> usize {
    64
}
