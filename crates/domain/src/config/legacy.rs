//! The flat `key=value` configuration format:
//!
//! ```text
//! listen=127.0.0.1:5300
//! cn_server=114.114.114.114:53
//! server=8.8.4.4:53
//! test_server=8.8.8.8:53
//! socks5=127.0.0.1:1080
//! ```
//!
//! It is translated into an equivalent two-group preset.

use std::net::{IpAddr, SocketAddr};

use tracing::warn;

use super::probe::ProbeConfig;
use super::rules::{RuleConfig, RuleKind};
use super::server::{default_listen, ServerConfig};
use super::upstream::UpstreamGroupConfig;
use super::Config;
use crate::dns_protocol::DEFAULT_DNS_PORT;

pub const DOMESTIC_GROUP: &str = "domestic";
pub const FOREIGN_GROUP: &str = "foreign";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyConfig {
    pub listen: SocketAddr,
    pub test_server: SocketAddr,
    pub cn_server: SocketAddr,
    pub server: SocketAddr,
    pub socks5: Option<SocketAddr>,
    pub user: Option<String>,
}

impl Default for LegacyConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            test_server: SocketAddr::from(([8, 8, 8, 8], DEFAULT_DNS_PORT)),
            cn_server: SocketAddr::from(([114, 114, 114, 114], DEFAULT_DNS_PORT)),
            server: SocketAddr::from(([8, 8, 4, 4], DEFAULT_DNS_PORT)),
            socks5: None,
            user: None,
        }
    }
}

impl LegacyConfig {
    /// Parses the flat format. Every non-comment line must be a known
    /// `key=value` pair, and at least one must be present.
    pub fn parse(contents: &str) -> Result<Self, String> {
        let mut legacy = Self::default();
        let mut keys = 0usize;

        for (line_num, raw) in contents.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| format!("parse config file failed at line: {}", line_num + 1))?;
            let value = value.trim();
            let addr = || {
                parse_addr(value).ok_or_else(|| {
                    format!(
                        "invalid address '{}' for '{}' at line: {}",
                        value,
                        key.trim(),
                        line_num + 1
                    )
                })
            };

            match key.trim() {
                "listen" => legacy.listen = addr()?,
                "test_server" => legacy.test_server = addr()?,
                "cn_server" => legacy.cn_server = addr()?,
                "server" => legacy.server = addr()?,
                "socks5" => legacy.socks5 = Some(addr()?),
                "user" => legacy.user = Some(value.to_string()),
                other => {
                    return Err(format!(
                        "unknown key '{}' at line: {}",
                        other,
                        line_num + 1
                    ))
                }
            }
            keys += 1;
        }

        if keys == 0 {
            return Err("no configuration keys found".to_string());
        }
        Ok(legacy)
    }

    pub fn into_config(self) -> Config {
        if let Some(user) = &self.user {
            warn!(user = %user, "Privilege drop is not supported; 'user' is ignored");
        }

        let domestic = UpstreamGroupConfig::new(
            DOMESTIC_GROUP,
            vec![format!("udp://{}", self.cn_server)],
        );
        let mut foreign =
            UpstreamGroupConfig::new(FOREIGN_GROUP, vec![format!("tcp://{}", self.server)]);
        foreign.trust = 2;
        foreign.socks5 = self.socks5;

        let reverse = RuleConfig::new(RuleKind::Reverse, None, vec![DOMESTIC_GROUP.to_string()]);

        let probe = ProbeConfig {
            enabled: true,
            server: self.test_server,
            polluted_groups: vec![FOREIGN_GROUP.to_string()],
            clean_groups: vec![DOMESTIC_GROUP.to_string()],
            ..ProbeConfig::default()
        };

        let mut config = Config {
            server: ServerConfig {
                listen: self.listen,
                ..ServerConfig::default()
            },
            groups: vec![domestic, foreign],
            rules: vec![reverse],
            probe,
            ..Config::empty()
        };
        config.dns.default_group = DOMESTIC_GROUP.to_string();
        config
    }
}

fn parse_addr(value: &str) -> Option<SocketAddr> {
    if let Ok(addr) = value.parse::<SocketAddr>() {
        return Some(addr);
    }
    value
        .parse::<IpAddr>()
        .ok()
        .map(|ip| SocketAddr::new(ip, DEFAULT_DNS_PORT))
}
