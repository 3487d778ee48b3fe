use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

/// Install a compact fmt subscriber filtered by `RUST_LOG`.
///
/// Without `RUST_LOG` the calling crate logs at `debug` and everything else at
/// `info`. Returns an error if a global subscriber is already installed.
pub fn init(crate_name: &str) -> Result<()> {
    let target = crate_name.replace('-', "_");
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("info,{target}=debug")))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))?;

    ::tracing::info!(target = %target, "tracing initialized");
    Ok(())
}
