use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    #[serde(default = "default_min_ttl")]
    pub min_ttl: u32,

    #[serde(default = "default_max_ttl")]
    pub max_ttl: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_entries: default_max_entries(),
            min_ttl: default_min_ttl(),
            max_ttl: default_max_ttl(),
        }
    }
}

fn default_max_entries() -> usize {
    10_000
}

fn default_min_ttl() -> u32 {
    0
}

fn default_max_ttl() -> u32 {
    86_400
}
