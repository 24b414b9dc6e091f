pub mod cache;
pub mod dns;
pub mod errors;
pub mod legacy;
pub mod logging;
pub mod poison;
pub mod probe;
pub mod root;
pub mod rules;
pub mod server;
pub mod upstream;

pub use cache::CacheConfig;
pub use dns::DnsConfig;
pub use errors::ConfigError;
pub use legacy::LegacyConfig;
pub use logging::LoggingConfig;
pub use poison::PoisonConfig;
pub use probe::ProbeConfig;
pub use root::{CliOverrides, Config, ProbeTargets, RuntimeSnapshot};
pub use rules::{RuleConfig, RuleKind};
pub use server::ServerConfig;
pub use upstream::UpstreamGroupConfig;

pub const DEFAULT_GROUP_TIMEOUT_MS: u64 = 2000;
