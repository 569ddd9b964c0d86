//! Serve the HTTP render API.

use std::sync::Arc;

use framecast_common::config::AppConfig;
use framecast_render_service::{ProgressTracker, RenderService};

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let tracker = Arc::new(ProgressTracker::new());
    let service = RenderService::from_config(&config, tracker)
        .map_err(|e| anyhow::anyhow!("Failed to set up render service: {e}"))?;

    tracing::info!(
        storage = ?config.storage.backend,
        persistence = ?config.persistence.backend,
        workers = service.max_concurrent_jobs(),
        "Render service configured"
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    println!("Framecast listening on http://{addr}");
    let app = framecast_render_service::app(service, &config.storage);
    framecast_render_service::serve(app, &addr).await?;
    Ok(())
}
