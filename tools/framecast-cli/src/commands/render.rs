//! Render a single job in-process.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use framecast_common::config::AppConfig;
use framecast_job_model::job::RenderJob;
use framecast_render_service::{ProgressTracker, RenderOutcome, RenderService};

pub async fn run(mut config: AppConfig, job_path: PathBuf, no_pause: bool) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(&job_path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", job_path.display()))?;
    let job: RenderJob = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Invalid job file {}: {e}", job_path.display()))?;

    if no_pause {
        config.render.stage_pause_ms = 0;
        config.render.terminal_delay_ms = 0;
    }

    println!("Rendering {}/{}", job.user_id, job.session_id);
    println!("  Session: {}", job.session_dir.display());
    println!("  Duration: {:.2}s", job.duration);
    println!("  Audio clips: {}", job.audio_timeline.len());

    let tracker = Arc::new(ProgressTracker::with_observer(Arc::new(|_, _, progress| {
        print!("\r  Progress: {progress:>5.1}%  ");
        std::io::stdout().flush().ok();
    })));
    let service = RenderService::from_config(&config, tracker)
        .map_err(|e| anyhow::anyhow!("Failed to set up render service: {e}"))?;

    let handle = service.submit(job)?;
    let key = handle.key().clone();
    match handle.wait().await? {
        RenderOutcome::Complete(_) => {
            let result = service.fetch(&key)?;
            println!("\nRender complete: {}", result.url);
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        RenderOutcome::Failed { step, reason } => {
            println!();
            Err(anyhow::anyhow!("Render failed at {step}: {reason}"))
        }
        RenderOutcome::Superseded => Err(anyhow::anyhow!("Render was superseded")),
    }
}
