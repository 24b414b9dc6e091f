use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::cache::CacheConfig;
use super::dns::DnsConfig;
use super::errors::ConfigError;
use super::legacy::LegacyConfig;
use super::logging::LoggingConfig;
use super::poison::PoisonConfig;
use super::probe::ProbeConfig;
use super::rules::RuleConfig;
use super::server::ServerConfig;
use super::upstream::UpstreamGroupConfig;
use crate::{ClassificationRule, GroupId, PoisonFilter, UpstreamGroup};

const LOCAL_CONFIG_PATH: &str = "sans.toml";
const SYSTEM_CONFIG_PATH: &str = "/etc/sans/sans.toml";

/// Main configuration structure for sans
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Listen address and TCP connection limits
    #[serde(default)]
    pub server: ServerConfig,

    /// Default group and per-query deadline
    #[serde(default)]
    pub dns: DnsConfig,

    #[serde(default)]
    pub groups: Vec<UpstreamGroupConfig>,

    #[serde(default)]
    pub rules: Vec<RuleConfig>,

    #[serde(default)]
    pub poison: PoisonConfig,

    #[serde(default)]
    pub probe: ProbeConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Built-in defaults mirror the flat-format preset: a domestic UDP group,
/// a trusted foreign TCP group and the pollution probe choosing between them.
impl Default for Config {
    fn default() -> Self {
        LegacyConfig::default().into_config()
    }
}

impl Config {
    /// A configuration with no groups or rules. Fails validation until
    /// at least one group is added.
    pub fn empty() -> Self {
        Self {
            server: ServerConfig::default(),
            dns: DnsConfig::default(),
            groups: Vec::new(),
            rules: Vec::new(),
            poison: PoisonConfig::default(),
            probe: ProbeConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Load configuration from file or use defaults
    ///
    /// Priority order:
    /// 1. Explicitly provided path
    /// 2. sans.toml in current directory
    /// 3. /etc/sans/sans.toml
    /// 4. Default configuration
    pub fn load(path: Option<&str>, cli_overrides: CliOverrides) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = path {
            Self::from_file(path)?
        } else if Path::new(LOCAL_CONFIG_PATH).exists() {
            Self::from_file(LOCAL_CONFIG_PATH)?
        } else if Path::new(SYSTEM_CONFIG_PATH).exists() {
            Self::from_file(SYSTEM_CONFIG_PATH)?
        } else {
            Self::default()
        };

        config.apply_cli_overrides(cli_overrides);
        Ok(config)
    }

    /// TOML first; a file that is not TOML but reads as the flat
    /// `key=value` format is translated instead.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string(), e.to_string()))?;
        Self::from_str_any(&contents)
    }

    pub fn from_str_any(contents: &str) -> Result<Self, ConfigError> {
        match toml::from_str::<Config>(contents) {
            Ok(config) => Ok(config),
            Err(toml_err) => match LegacyConfig::parse(contents) {
                Ok(legacy) => {
                    info!("Loaded flat key=value configuration");
                    Ok(legacy.into_config())
                }
                Err(_) => Err(ConfigError::Parse(toml_err.to_string())),
            },
        }
    }

    fn apply_cli_overrides(&mut self, overrides: CliOverrides) {
        if let Some(listen) = overrides.listen {
            self.server.listen = listen;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.build_snapshot().map(|_| ())
    }

    /// Resolves names to ids and parses every pattern, endpoint and range
    /// into the immutable runtime snapshot shared by query workers.
    pub fn build_snapshot(&self) -> Result<RuntimeSnapshot, ConfigError> {
        if self.server.listen.port() == 0 {
            return Err(ConfigError::Validation("Listen port cannot be 0".to_string()));
        }

        if self.groups.is_empty() {
            return Err(ConfigError::Validation(
                "No upstream groups configured".to_string(),
            ));
        }

        let mut group_ids: HashMap<&str, GroupId> = HashMap::with_capacity(self.groups.len());
        let mut groups = Vec::with_capacity(self.groups.len());
        for (id, group_cfg) in self.groups.iter().enumerate() {
            if group_cfg.servers.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Group '{}' has no servers",
                    group_cfg.name
                )));
            }
            if group_ids.insert(group_cfg.name.as_str(), id).is_some() {
                return Err(ConfigError::Validation(format!(
                    "Duplicate group name '{}'",
                    group_cfg.name
                )));
            }
            groups.push(group_cfg.to_group(id)?);
        }

        let rules = self
            .rules
            .iter()
            .enumerate()
            .map(|(index, rule)| rule.to_rule(index, &group_ids))
            .collect::<Result<Vec<_>, _>>()?;

        let default_group = *group_ids
            .get(self.dns.default_group.as_str())
            .ok_or_else(|| {
                ConfigError::Validation(format!(
                    "Default group '{}' is not defined",
                    self.dns.default_group
                ))
            })?;

        let probe = if self.probe.enabled {
            let resolve = |names: &[String], role: &str| -> Result<Vec<GroupId>, ConfigError> {
                if names.is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "Probe {} groups are empty",
                        role
                    )));
                }
                names
                    .iter()
                    .map(|name| {
                        group_ids.get(name.as_str()).copied().ok_or_else(|| {
                            ConfigError::Validation(format!(
                                "Probe {} group '{}' is not defined",
                                role, name
                            ))
                        })
                    })
                    .collect()
            };
            Some(ProbeTargets {
                server: self.probe.server,
                timeout: Duration::from_millis(self.probe.timeout_ms),
                polluted: resolve(&self.probe.polluted_groups, "polluted")?,
                clean: resolve(&self.probe.clean_groups, "clean")?,
                max_verdicts: self.probe.max_verdicts,
            })
        } else {
            None
        };

        if self.cache.enabled && self.cache.min_ttl > self.cache.max_ttl {
            return Err(ConfigError::Validation(
                "cache.min_ttl exceeds cache.max_ttl".to_string(),
            ));
        }

        let poison = self.poison.to_filter()?;

        let query_deadline = match self.dns.query_deadline_ms {
            Some(0) => {
                return Err(ConfigError::Validation(
                    "dns.query_deadline_ms cannot be 0".to_string(),
                ))
            }
            Some(ms) => Duration::from_millis(ms),
            None => groups
                .iter()
                .map(|g| g.timeout)
                .max()
                .unwrap_or(Duration::from_millis(super::DEFAULT_GROUP_TIMEOUT_MS)),
        };

        Ok(RuntimeSnapshot {
            groups,
            rules,
            poison,
            default_group,
            probe,
            query_deadline,
            udp_retransmit: Duration::from_millis(self.dns.udp_retransmit_ms),
        })
    }

    /// Save configuration to file
    pub fn save(&self, path: &str) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Parse(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, toml_string)
            .map_err(|e| ConfigError::FileWrite(path.to_string(), e.to_string()))?;
        Ok(())
    }
}

/// Command-line overrides for configuration
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub listen: Option<SocketAddr>,
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTargets {
    pub server: SocketAddr,
    pub timeout: Duration,
    pub polluted: Vec<GroupId>,
    pub clean: Vec<GroupId>,
    pub max_verdicts: usize,
}

/// Immutable view of the configuration built once at startup.
#[derive(Debug, Clone)]
pub struct RuntimeSnapshot {
    pub groups: Vec<UpstreamGroup>,
    pub rules: Vec<ClassificationRule>,
    pub poison: PoisonFilter,
    pub default_group: GroupId,
    pub probe: Option<ProbeTargets>,
    pub query_deadline: Duration,
    pub udp_retransmit: Duration,
}

impl RuntimeSnapshot {
    pub fn group(&self, id: GroupId) -> Option<&UpstreamGroup> {
        self.groups.get(id)
    }
}
