use anyhow::Context;
use sans_domain::{CliOverrides, Config};

/// Loads and validates. An invalid configuration is fatal at startup.
pub fn load_config(path: Option<&str>, overrides: CliOverrides) -> anyhow::Result<Config> {
    let config = Config::load(path, overrides).context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}
