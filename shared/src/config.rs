use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::env;

use anyhow::{Context, Result};

const DEFAULT_BIND: &str = "0.0.0.0:8000";
const DEFAULT_LAYOUT_PATH: &str = "data/dashboard.toml";

pub struct ServerConfig {
    /// Address the HTTP server listens on
    pub bind_addr: SocketAddr,
    /// TOML file describing the charts shown for each silo
    pub layout_path: PathBuf,
}

impl ServerConfig {
    pub fn load(manifest_dir: &Path) -> Result<Self> {
        #[cfg(debug_assertions)]
        if let Err(e) = dotenvy::from_path(manifest_dir.join(".env")) {
            ::tracing::debug!("no .env file loaded: {e}");
        }
        #[cfg(not(debug_assertions))]
        let _ = manifest_dir;

        let bind = env::var("DASHBOARD_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_owned());
        let bind_addr = bind
            .parse()
            .with_context(|| format!("DASHBOARD_BIND is not a socket address: {bind}"))?;

        let layout_path = env::var("DASHBOARD_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_LAYOUT_PATH));

        Ok(Self {
            bind_addr,
            layout_path,
        })
    }
}

/// Load server config using the calling crate's manifest directory.
#[macro_export]
macro_rules! load_server_config {
    () => {
        $crate::config::ServerConfig::load(std::path::Path::new(env!("CARGO_MANIFEST_DIR")))
    };
}
