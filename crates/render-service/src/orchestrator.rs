//! Drives one job through the render stages.
//!
//! ```text
//! Submitted(75) → compose audio → AudioDone(85) → mux frames → FramesDone(90)
//!   → join → Muxed(95) → cleanup → upload → Uploaded(99.9)
//!   → persist → Complete(100)
//! ```
//!
//! Runs on a blocking thread. Nothing is retried; the first failing stage
//! moves the record to `failed`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use framecast_common::config::RenderSettings;
use framecast_common::error::FramecastError;
use framecast_common::timing::StageTimer;
use framecast_job_model::job::{JobKey, RenderJob};
use framecast_job_model::result::{RenderResult, StageTimings};
use framecast_job_model::stage::RenderStage;
use framecast_publisher::{object_key, ArtifactStore, ResultSink};
use framecast_render_engine::{RenderPipeline, SessionCleanup, SessionLayout};

use crate::tracker::{JobId, ProgressTracker, TrackerError};

/// Pauses and artifact policy for a run.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Pause after the 85% and 90% updates.
    pub stage_pause: Duration,
    /// Delay between persisting the result and reporting 100%.
    pub terminal_delay: Duration,
    pub keep_final_artifact: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from(&RenderSettings::default())
    }
}

impl From<&RenderSettings> for OrchestratorSettings {
    fn from(settings: &RenderSettings) -> Self {
        Self {
            stage_pause: Duration::from_millis(settings.stage_pause_ms),
            terminal_delay: Duration::from_millis(settings.terminal_delay_ms),
            keep_final_artifact: settings.keep_final_artifact,
        }
    }
}

impl OrchestratorSettings {
    /// No pauses at all.
    pub fn immediate() -> Self {
        Self {
            stage_pause: Duration::ZERO,
            terminal_delay: Duration::ZERO,
            keep_final_artifact: true,
        }
    }
}

/// Step of a run that can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Audio,
    Frames,
    Join,
    Cleanup,
    Upload,
    Persist,
    /// The worker slot or thread running the job.
    Worker,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Frames => "frames",
            Self::Join => "join",
            Self::Cleanup => "cleanup",
            Self::Upload => "upload",
            Self::Persist => "persist",
            Self::Worker => "worker",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a run ended.
#[derive(Debug, Clone)]
pub enum RenderOutcome {
    Complete(RenderResult),
    Failed { step: Step, reason: String },
    /// A newer submission for the same key took over.
    Superseded,
}

impl RenderOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }
}

enum Cause {
    Engine(FramecastError),
    Tracker(TrackerError),
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Engine(err) => write!(f, "{err}"),
            Self::Tracker(err) => write!(f, "{err}"),
        }
    }
}

struct RunError {
    step: Step,
    cause: Cause,
}

trait StepContext<T> {
    fn step(self, step: Step) -> Result<T, RunError>;
}

impl<T> StepContext<T> for Result<T, FramecastError> {
    fn step(self, step: Step) -> Result<T, RunError> {
        self.map_err(|err| RunError {
            step,
            cause: Cause::Engine(err),
        })
    }
}

impl<T> StepContext<T> for Result<T, TrackerError> {
    fn step(self, step: Step) -> Result<T, RunError> {
        self.map_err(|err| RunError {
            step,
            cause: Cause::Tracker(err),
        })
    }
}

/// Runs jobs against a pipeline, a store, and a sink.
pub struct Orchestrator {
    pipeline: Arc<dyn RenderPipeline>,
    store: Arc<dyn ArtifactStore>,
    sink: Arc<dyn ResultSink>,
    tracker: Arc<ProgressTracker>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        pipeline: Arc<dyn RenderPipeline>,
        store: Arc<dyn ArtifactStore>,
        sink: Arc<dyn ResultSink>,
        tracker: Arc<ProgressTracker>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            pipeline,
            store,
            sink,
            tracker,
            settings,
        }
    }

    pub fn tracker(&self) -> &Arc<ProgressTracker> {
        &self.tracker
    }

    pub fn pipeline(&self) -> &dyn RenderPipeline {
        self.pipeline.as_ref()
    }

    /// Run `job` to completion. The record must already be started as `job_id`.
    pub fn run(&self, job: &RenderJob, job_id: JobId) -> RenderOutcome {
        let key = job.key();
        let layout = SessionLayout::new(&job.session_dir);
        let mut cleanup = SessionCleanup::arm(layout.clone());
        let timer = StageTimer::start();

        tracing::info!(
            user_id = %key.user_id,
            session_id = %key.session_id,
            job_id = %job_id,
            pipeline = self.pipeline.name(),
            "Render started"
        );

        match self.execute(job, &key, job_id, &layout, &mut cleanup) {
            Ok(result) => {
                tracing::info!(
                    user_id = %key.user_id,
                    session_id = %key.session_id,
                    job_id = %job_id,
                    url = %result.url,
                    total_time = result.total_time,
                    elapsed_ms = timer.elapsed_ms(),
                    "Render complete"
                );
                RenderOutcome::Complete(result)
            }
            // A newer submission owns the session directory now.
            Err(_) if !self.tracker.owns(&key, job_id) => {
                cleanup.disarm();
                tracing::warn!(
                    user_id = %key.user_id,
                    session_id = %key.session_id,
                    job_id = %job_id,
                    "Render superseded by a newer submission; abandoning"
                );
                RenderOutcome::Superseded
            }
            Err(RunError { step, cause }) => {
                let reason = cause.to_string();
                self.record_failure(&key, job_id, &reason);
                RenderOutcome::Failed { step, reason }
            }
        }
    }

    fn execute(
        &self,
        job: &RenderJob,
        key: &JobKey,
        job_id: JobId,
        layout: &SessionLayout,
        cleanup: &mut SessionCleanup,
    ) -> Result<RenderResult, RunError> {
        let mut timings = StageTimings::from_job(job);

        self.ensure_owner(key, job_id).step(Step::Audio)?;
        let timer = StageTimer::start();
        let audio = self.pipeline.compose_audio(job, layout).step(Step::Audio)?;
        timings.audio_creation_time = timer.elapsed_secs();
        tracing::info!(
            job_id = %job_id,
            clips_mixed = audio.clips_mixed,
            clips_skipped = audio.clips_skipped,
            elapsed_ms = timer.elapsed_ms(),
            "Audio composed"
        );
        self.tracker
            .advance(key, job_id, RenderStage::AudioDone)
            .step(Step::Audio)?;
        self.pause(self.settings.stage_pause);

        self.ensure_owner(key, job_id).step(Step::Frames)?;
        let timer = StageTimer::start();
        let mux = self.pipeline.mux_frames(layout).step(Step::Frames)?;
        timings.frame_combination_time = timer.elapsed_secs();
        tracing::info!(
            job_id = %job_id,
            frames = mux.scan.frame_count,
            elapsed_ms = timer.elapsed_ms(),
            "Frames combined"
        );
        self.tracker
            .advance(key, job_id, RenderStage::FramesDone)
            .step(Step::Frames)?;
        self.pause(self.settings.stage_pause);

        self.ensure_owner(key, job_id).step(Step::Join)?;
        let timer = StageTimer::start();
        let final_video = self.pipeline.join_av(layout).step(Step::Join)?;
        timings.audio_video_integration_time = timer.elapsed_secs();
        self.tracker
            .advance(key, job_id, RenderStage::Muxed)
            .step(Step::Join)?;

        self.ensure_owner(key, job_id).step(Step::Cleanup)?;
        cleanup.run().step(Step::Cleanup)?;

        self.ensure_owner(key, job_id).step(Step::Upload)?;
        let timer = StageTimer::start();
        let url = self
            .store
            .upload(&final_video, &object_key(&job.user_id, &job.session_id))
            .step(Step::Upload)?;
        timings.upload_time = timer.elapsed_secs();
        tracing::info!(
            job_id = %job_id,
            store = self.store.name(),
            url = %url,
            elapsed_ms = timer.elapsed_ms(),
            "Video published"
        );
        self.tracker
            .advance(key, job_id, RenderStage::Uploaded)
            .step(Step::Upload)?;

        let result = RenderResult::new(job, url, timings);
        self.sink.insert(&result).step(Step::Persist)?;

        if !self.settings.keep_final_artifact {
            if let Err(err) = std::fs::remove_file(&final_video) {
                tracing::warn!(
                    path = %final_video.display(),
                    error = %err,
                    "Failed to remove published video"
                );
            }
        }

        self.pause(self.settings.terminal_delay);
        self.tracker
            .complete(key, job_id, result.clone())
            .step(Step::Persist)?;
        Ok(result)
    }

    fn ensure_owner(&self, key: &JobKey, job_id: JobId) -> Result<(), TrackerError> {
        if self.tracker.owns(key, job_id) {
            Ok(())
        } else {
            Err(TrackerError::Superseded {
                key: key.clone(),
                job_id,
            })
        }
    }

    fn record_failure(&self, key: &JobKey, job_id: JobId, reason: &str) {
        if let Err(err) = self.tracker.fail(key, job_id, reason) {
            tracing::warn!(key = %key, job_id = %job_id, error = %err, "Could not record failure");
        }
    }

    fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("pipeline", &self.pipeline.name())
            .field("store", &self.store.name())
            .field("sink", &self.sink.name())
            .field("settings", &self.settings)
            .finish()
    }
}
