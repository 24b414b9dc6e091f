use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DnsConfig {
    /// Group used when no classification rule matches.
    #[serde(default = "default_group")]
    pub default_group: String,

    /// Overall per-query deadline. When unset the slowest group timeout
    /// is used.
    #[serde(default)]
    pub query_deadline_ms: Option<u64>,

    /// Wait before the single UDP retransmit.
    #[serde(default = "default_udp_retransmit_ms")]
    pub udp_retransmit_ms: u64,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            default_group: default_group(),
            query_deadline_ms: None,
            udp_retransmit_ms: default_udp_retransmit_ms(),
        }
    }
}

fn default_group() -> String {
    "default".to_string()
}

fn default_udp_retransmit_ms() -> u64 {
    800
}
