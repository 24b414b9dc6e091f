use serde::{Deserialize, Serialize};

use super::errors::ConfigError;
use crate::{PoisonFilter, PoisonFilterEntry};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoisonConfig {
    /// Include the well-known forged sentinel addresses.
    #[serde(default = "default_builtin")]
    pub builtin: bool,

    /// Extra addresses or CIDR ranges.
    #[serde(default)]
    pub addresses: Vec<String>,
}

impl Default for PoisonConfig {
    fn default() -> Self {
        Self {
            builtin: default_builtin(),
            addresses: Vec::new(),
        }
    }
}

impl PoisonConfig {
    pub fn to_filter(&self) -> Result<PoisonFilter, ConfigError> {
        let entries = self
            .addresses
            .iter()
            .map(|s| s.parse::<PoisonFilterEntry>().map_err(ConfigError::Validation))
            .collect::<Result<Vec<_>, _>>()?;

        let mut filter = if self.builtin {
            PoisonFilter::builtin()
        } else {
            PoisonFilter::default()
        };
        filter.extend(PoisonFilter::new(entries));
        Ok(filter)
    }
}

fn default_builtin() -> bool {
    true
}
