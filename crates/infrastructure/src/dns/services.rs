//! Wires the runtime snapshot into a ready-to-serve handler.

use sans_application::metrics::DispatchMetrics;
use sans_application::ports::{PollutionProbe, ResponseCache, UpstreamClient};
use sans_application::use_cases::ResolveQueryUseCase;
use sans_domain::{Config, DomainError, RuntimeSnapshot};
use std::sync::Arc;
use tracing::info;

use super::cache::LruResponseCache;
use super::handler::DnsHandler;
use super::probe::SoaPollutionProbe;
use super::server::{DnsServer, ListenerConfig};
use super::upstream_pool::UpstreamPool;

pub struct DnsServices {
    pub snapshot: Arc<RuntimeSnapshot>,
    pub use_case: Arc<ResolveQueryUseCase>,
    pub handler: DnsHandler,
    pub metrics: Arc<DispatchMetrics>,
    pub listener: ListenerConfig,
}

impl DnsServices {
    /// Validates `config` and builds every component. Configuration errors
    /// surface here, before any socket is bound.
    pub fn new(config: &Config) -> Result<Self, DomainError> {
        let snapshot = config.build_snapshot()?;
        let upstream: Arc<dyn UpstreamClient> = Arc::new(UpstreamPool::new(snapshot.udp_retransmit));
        Ok(Self::with_upstream(config, snapshot, upstream))
    }

    /// Same as [`DnsServices::new`] with a caller-supplied upstream client.
    pub fn with_upstream(
        config: &Config,
        snapshot: RuntimeSnapshot,
        upstream: Arc<dyn UpstreamClient>,
    ) -> Self {
        let metrics = Arc::new(DispatchMetrics::new());
        let mut use_case =
            ResolveQueryUseCase::new(&snapshot, upstream).with_metrics(Arc::clone(&metrics));

        if let Some(targets) = &snapshot.probe {
            let probe: Arc<dyn PollutionProbe> =
                Arc::new(SoaPollutionProbe::from_targets(targets, snapshot.udp_retransmit));
            use_case = use_case.with_probe(&snapshot, probe);
            info!(server = %targets.server, "Pollution probe enabled");
        }

        if config.cache.enabled {
            let cache: Arc<dyn ResponseCache> = Arc::new(LruResponseCache::from_config(&config.cache));
            use_case = use_case.with_cache(cache);
            info!(max_entries = config.cache.max_entries, "Response cache enabled");
        }

        info!(
            groups = snapshot.groups.len(),
            rules = snapshot.rules.len(),
            poison_entries = snapshot.poison.len(),
            deadline_ms = snapshot.query_deadline.as_millis() as u64,
            "DNS services initialized"
        );

        let use_case = Arc::new(use_case);
        Self {
            snapshot: Arc::new(snapshot),
            handler: DnsHandler::new(Arc::clone(&use_case)),
            use_case,
            metrics,
            listener: ListenerConfig::from_server_config(&config.server),
        }
    }

    pub fn server(&self) -> DnsServer {
        DnsServer::new(self.listener.clone(), self.handler.clone())
    }
}
