//! Job submission on a bounded pool of blocking workers.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use framecast_common::config::AppConfig;
use framecast_common::error::{FramecastError, FramecastResult};
use framecast_job_model::job::{JobKey, RenderJob};
use framecast_job_model::result::RenderResult;
use framecast_render_engine::FfmpegPipeline;

use crate::orchestrator::{Orchestrator, OrchestratorSettings, RenderOutcome, Step};
use crate::tracker::{JobId, ProgressSnapshot, ProgressTracker, TrackerError};

/// A submitted job. Dropping it detaches the job; it keeps running.
#[derive(Debug)]
pub struct RenderHandle {
    job_id: JobId,
    key: JobKey,
    task: JoinHandle<RenderOutcome>,
}

impl RenderHandle {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn key(&self) -> &JobKey {
        &self.key
    }

    /// Wait for the job to finish.
    pub async fn wait(self) -> FramecastResult<RenderOutcome> {
        self.task
            .await
            .map_err(|e| FramecastError::render(format!("render task for {} ended abnormally: {e}", self.key)))
    }
}

/// Accepts jobs and answers progress and result queries.
#[derive(Clone)]
pub struct RenderService {
    orchestrator: Arc<Orchestrator>,
    permits: Arc<Semaphore>,
    max_concurrent_jobs: usize,
}

impl RenderService {
    pub fn new(orchestrator: Orchestrator, max_concurrent_jobs: usize) -> Self {
        let max_concurrent_jobs = max_concurrent_jobs.max(1);
        Self {
            orchestrator: Arc::new(orchestrator),
            permits: Arc::new(Semaphore::new(max_concurrent_jobs)),
            max_concurrent_jobs,
        }
    }

    /// Wire the ffmpeg pipeline and the configured publisher backends.
    pub fn from_config(config: &AppConfig, tracker: Arc<ProgressTracker>) -> FramecastResult<Self> {
        let pipeline = Arc::new(FfmpegPipeline::new(&config.render));
        let store = framecast_publisher::artifact_store(&config.storage)?;
        let sink = framecast_publisher::result_sink(&config.persistence)?;
        let orchestrator = Orchestrator::new(
            pipeline,
            store,
            sink,
            tracker,
            OrchestratorSettings::from(&config.render),
        );
        Ok(Self::new(orchestrator, config.render.max_concurrent_jobs))
    }

    pub fn tracker(&self) -> &Arc<ProgressTracker> {
        self.orchestrator.tracker()
    }

    pub fn max_concurrent_jobs(&self) -> usize {
        self.max_concurrent_jobs
    }

    /// Jobs currently holding a worker slot.
    pub fn running_jobs(&self) -> usize {
        self.max_concurrent_jobs - self.permits.available_permits()
    }

    /// Validate and register `job`, then render it in the background.
    ///
    /// The record exists at 75% by the time this returns. Must be called
    /// from within a Tokio runtime.
    pub fn submit(&self, job: RenderJob) -> FramecastResult<RenderHandle> {
        job.validate()
            .map_err(|e| FramecastError::validation(e.to_string()))?;
        let key = job.key();
        let tracker = Arc::clone(self.tracker());
        let job_id = tracker.start(&key);

        tracing::info!(
            user_id = %key.user_id,
            session_id = %key.session_id,
            job_id = %job_id,
            clips = job.audio_timeline.len(),
            duration = job.duration,
            "Render submitted"
        );

        let orchestrator = Arc::clone(&self.orchestrator);
        let permits = Arc::clone(&self.permits);
        let task_key = key.clone();
        let task = tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(err) => return abort(&tracker, &task_key, job_id, err.to_string()),
            };
            match tokio::task::spawn_blocking(move || orchestrator.run(&job, job_id)).await {
                Ok(outcome) => outcome,
                Err(err) => abort(&tracker, &task_key, job_id, format!("render worker crashed: {err}")),
            }
        });

        Ok(RenderHandle { job_id, key, task })
    }

    pub fn poll(&self, key: &JobKey) -> Result<ProgressSnapshot, TrackerError> {
        self.tracker().poll(key)
    }

    pub fn fetch(&self, key: &JobKey) -> Result<RenderResult, TrackerError> {
        self.tracker().fetch(key)
    }
}

impl std::fmt::Debug for RenderService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderService")
            .field("orchestrator", &self.orchestrator)
            .field("max_concurrent_jobs", &self.max_concurrent_jobs)
            .finish()
    }
}

fn abort(tracker: &ProgressTracker, key: &JobKey, job_id: JobId, reason: String) -> RenderOutcome {
    if let Err(err) = tracker.fail(key, job_id, reason.as_str()) {
        tracing::warn!(key = %key, job_id = %job_id, error = %err, "Could not record failure");
    }
    RenderOutcome::Failed {
        step: Step::Worker,
        reason,
    }
}
