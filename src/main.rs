//! ircbridge - a multi-network IRC relay bridge.
//!
//! Connects a fleet of bot accounts across configured networks, relaying
//! channel traffic between them through per-pipe weight-balanced membership.

mod bot;
mod buffer;
mod channel_table;
mod config;
mod conn;
mod encoding;
mod error;
mod formatter;
mod message;
mod network;
mod pipe;
mod supervisor;

use tracing::{error, info};

use crate::config::Config;
use crate::supervisor::{resolve_config_path, Supervisor};

/// Resolve the CLI's single optional positional profile argument.
fn cli_profile() -> Option<String> {
    std::env::args().nth(1)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = resolve_config_path(cli_profile().as_deref());

    let config = Config::load(&config_path).map_err(|e| {
        eprintln!("ERROR: failed to load config from {}: {}", config_path.display(), e);
        e
    })?;

    let default_level = if config.debug { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    match config.log_format {
        crate::config::LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .json()
                .init();
        }
        crate::config::LogFormat::Pretty => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .init();
        }
    }

    info!(
        config = %config_path.display(),
        version = config.version,
        networks = config.network.len(),
        bots = config.bot.len(),
        pipes = config.pipe.len(),
        test_mode = config.test,
        "starting ircbridge"
    );

    let mut supervisor = Supervisor::from_config(config_path, config);

    tokio::select! {
        _ = supervisor.run() => {
            error!("supervisor loop exited unexpectedly");
            Err(anyhow::anyhow!("supervisor loop terminated"))
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received ctrl-c, shutting down");
            Ok(())
        }
    }
}
