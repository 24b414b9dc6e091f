//! sans domain layer
//!
//! Configuration model, error taxonomy and the immutable runtime entities
//! shared read-only by every query worker.
pub mod classification;
pub mod config;
pub mod dns_protocol;
pub mod dns_query;
pub mod domain_name;
pub mod errors;
pub mod poison;
pub mod record_type;
pub mod upstream_group;

pub use classification::{ClassificationRule, RuleMatcher};
pub use config::{CliOverrides, Config, ConfigError, ProbeTargets, RuntimeSnapshot};
pub use dns_protocol::UpstreamEndpoint;
pub use dns_query::{Query, QueryOrigin};
pub use errors::DomainError;
pub use poison::{PoisonFilter, PoisonFilterEntry};
pub use record_type::RecordType;
pub use upstream_group::{GroupId, UpstreamGroup, UpstreamStrategy};
