use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

/// Environment variable that overrides the verbosity flags, e.g. `WIKI_LOG=wiki_core=trace`.
pub const LOG_ENV: &str = "WIKI_LOG";

/// Install the stderr subscriber. `-v` raises the default level one step per flag.
pub fn init(verbosity: u8) -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbosity)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}

fn default_level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}
