use sans_infrastructure::dns::DnsServices;
use tokio::signal;
use tracing::info;

/// Serves until SIGINT or SIGTERM, then stops gracefully.
pub async fn run_dns_server(services: DnsServices) -> anyhow::Result<()> {
    let bind_addr = services.listener.listen;
    let running = services.server().start().map_err(|e| {
        anyhow::anyhow!("failed to bind DNS listener on {bind_addr}: {e}")
    })?;

    info!(udp = %running.udp_addr(), tcp = %running.tcp_addr(), "Serving DNS");

    tokio::select! {
        result = signal::ctrl_c() => {
            result?;
            info!("Received SIGINT, initiating shutdown...");
        }
        result = wait_for_sigterm() => {
            result?;
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    running.stop().await;

    let stats = services.metrics.snapshot();
    info!(
        received = stats.received,
        resolved = stats.resolved,
        timed_out = stats.timed_out,
        failed = stats.failed,
        cache_hits = stats.cache_hits,
        poisoned = stats.poisoned,
        stragglers = stats.stragglers,
        probes = stats.probes,
        "Dispatch summary"
    );
    Ok(())
}

#[cfg(unix)]
async fn wait_for_sigterm() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate())?;
    sigterm.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_sigterm() -> std::io::Result<()> {
    std::future::pending::<()>().await;
    Ok(())
}
