use clap::Parser;
use sans_domain::CliOverrides;
use sans_infrastructure::dns::DnsServices;
use std::net::SocketAddr;
use tracing::info;

mod bootstrap;
mod server;

#[derive(Parser, Debug)]
#[command(name = "sans")]
#[command(version)]
#[command(about = "sans - DNS forwarder that routes around poisoned answers")]
struct Cli {
    /// Configuration file path (TOML or flat key=value)
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<String>,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Listen address, overrides the configuration
    #[arg(short = 'l', long, value_name = "ADDR:PORT")]
    listen: Option<SocketAddr>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cli_overrides = CliOverrides {
        listen: cli.listen,
        log_level: cli.log_level.clone(),
    };

    let config = bootstrap::load_config(cli.config.as_deref(), cli_overrides)?;

    bootstrap::init_logging(&config, cli.verbose)?;

    info!("Starting sans v{}", env!("CARGO_PKG_VERSION"));

    let services = DnsServices::new(&config)?;
    server::run_dns_server(services).await?;

    info!("Server shutdown complete");
    Ok(())
}
