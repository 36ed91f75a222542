pub mod api;
pub mod app;
pub mod config;
pub mod conversation;
pub mod midi;
pub mod parser;
pub mod pitch;
pub mod playback;
pub mod session;
pub mod store;
pub mod synth;
pub mod types;
pub mod ui;

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

pub fn setup_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|err: Box<dyn std::error::Error + Send + Sync>| {
            anyhow!("failed to initialise tracing: {err}")
        })?;
    Ok(())
}
