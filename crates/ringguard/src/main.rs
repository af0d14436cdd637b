//! Ringguard controller binary

use anyhow::Context;
use ringguard::{Config, RingServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing file means built-in defaults; a file that fails to parse or
    // validate stops startup before any rule reaches a switch.
    let config = Config::load().context("invalid configuration")?;

    let log_level = config
        .logging
        .level
        .clone()
        .unwrap_or_else(|| "info".into());
    common::logging::init_with(&log_level, config.logging.is_json());

    tracing::info!("Ringguard controller starting");

    RingServer::new(config.to_controller_config())
        .run()
        .await
        .context("ring controller failed")?;

    Ok(())
}
