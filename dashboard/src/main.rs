use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use silo_dashboard::state::AppState;
use silo_dashboard::{background, dashboard_config, routes};

#[tokio::main]
async fn main() -> Result<()> {
    shared::init_tracing!()?;
    let config = shared::load_server_config!()?;

    let layout = dashboard_config::load(&config.layout_path).with_context(|| {
        format!(
            "failed to load dashboard layout from {}",
            config.layout_path.display()
        )
    })?;
    info!(charts = layout.charts.len(), "dashboard layout loaded");

    let state = Arc::new(AppState::new(layout));
    state.settings.subscribe(|settings| {
        info!(
            selected_days = settings.selected_days,
            metrics = ?settings.metrics,
            "chart settings changed"
        );
    });

    background::spawn_background_workers(Arc::clone(&state));

    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;
    info!("listening on {}", config.bind_addr);
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
