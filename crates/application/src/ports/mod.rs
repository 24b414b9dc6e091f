mod pollution_probe;
mod response_cache;
mod upstream_client;

pub use pollution_probe::{PollutionProbe, ProbeVerdict};
pub use response_cache::ResponseCache;
pub use upstream_client::UpstreamClient;

// Re-export for convenience
pub use sans_domain::Query;
