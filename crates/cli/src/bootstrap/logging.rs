use sans_domain::Config;
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins, then `-v`, then the configured level.
pub fn init_logging(config: &Config, verbose: bool) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(effective_level(&config.logging.level, verbose))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let installed = if config.logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))
}

fn effective_level(configured: &str, verbose: bool) -> &str {
    if verbose {
        "debug"
    } else if configured.trim().is_empty() {
        "info"
    } else {
        configured
    }
}
