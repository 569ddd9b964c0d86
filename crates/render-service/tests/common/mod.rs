#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use framecast_common::error::{FramecastError, FramecastResult};
use framecast_job_model::job::{AudioTimelineEntry, JobKey, RenderJob, Resolution};
use framecast_job_model::result::RenderResult;
use framecast_publisher::{ArtifactStore, ResultSink};
use framecast_render_engine::muxer::FrameScan;
use framecast_render_engine::{AudioReport, MuxReport, RenderPipeline, SessionLayout};
use framecast_render_service::{
    Orchestrator, OrchestratorSettings, ProgressTracker, RenderService,
};

const STEP_TIME: Duration = Duration::from_millis(5);

/// Which pipeline call should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Nowhere,
    Audio,
    Frames,
    Join,
    /// Upload is rejected by the store.
    Upload,
    /// The result row is rejected by the sink.
    Persist,
    /// Resubmits the same key from inside audio composition, then fails.
    AudioAfterResubmit,
    /// Resubmits the same key from inside the AV join, then succeeds.
    JoinAfterResubmit,
}

/// Writes placeholder files instead of running ffmpeg.
pub struct FakePipeline {
    fail_at: FailAt,
    tracker: Arc<ProgressTracker>,
    last_key: Mutex<Option<JobKey>>,
    pub audio_calls: AtomicUsize,
}

impl FakePipeline {
    pub fn new(fail_at: FailAt, tracker: Arc<ProgressTracker>) -> Self {
        Self {
            fail_at,
            tracker,
            last_key: Mutex::new(None),
            audio_calls: AtomicUsize::new(0),
        }
    }
}

impl RenderPipeline for FakePipeline {
    fn compose_audio(&self, job: &RenderJob, layout: &SessionLayout) -> FramecastResult<AudioReport> {
        self.audio_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_key.lock() = Some(job.key());
        std::thread::sleep(STEP_TIME);
        match self.fail_at {
            FailAt::Audio => return Err(FramecastError::audio("decoder exploded")),
            FailAt::AudioAfterResubmit => {
                self.tracker.start(&job.key());
                return Err(FramecastError::audio("decoder exploded"));
            }
            _ => {}
        }
        std::fs::write(layout.composed_audio(), b"wav")?;
        Ok(AudioReport {
            output: layout.composed_audio(),
            duration_ms: job.duration_ms(),
            clips_mixed: job.audio_timeline.len(),
            clips_skipped: 0,
            elapsed_secs: STEP_TIME.as_secs_f64(),
        })
    }

    fn mux_frames(&self, layout: &SessionLayout) -> FramecastResult<MuxReport> {
        std::thread::sleep(STEP_TIME);
        if self.fail_at == FailAt::Frames {
            return Err(FramecastError::render("ffmpeg frame-mux exited with status 1"));
        }
        std::fs::write(layout.silent_video(), b"mp4")?;
        Ok(MuxReport {
            scan: FrameScan::default(),
            elapsed_secs: STEP_TIME.as_secs_f64(),
        })
    }

    fn join_av(&self, layout: &SessionLayout) -> FramecastResult<PathBuf> {
        std::thread::sleep(STEP_TIME);
        if self.fail_at == FailAt::Join {
            return Err(FramecastError::render("ffmpeg av-join exited with status 1"));
        }
        if self.fail_at == FailAt::JoinAfterResubmit {
            if let Some(key) = self.last_key.lock().clone() {
                self.tracker.start(&key);
            }
        }
        std::fs::write(layout.final_video(), b"final")?;
        Ok(layout.final_video())
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Records uploads and hands back a predictable URL.
#[derive(Default)]
pub struct FakeStore {
    fail: bool,
    pub uploads: Mutex<Vec<(PathBuf, String)>>,
}

impl FakeStore {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

impl ArtifactStore for FakeStore {
    fn upload(&self, path: &Path, object_key: &str) -> FramecastResult<String> {
        std::thread::sleep(STEP_TIME);
        if !path.exists() {
            return Err(FramecastError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        if self.fail {
            return Err(FramecastError::publish("storage returned 503 Service Unavailable"));
        }
        self.uploads
            .lock()
            .push((path.to_path_buf(), object_key.to_string()));
        Ok(format!("https://cdn.test/{object_key}"))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

#[derive(Default)]
pub struct MemorySink {
    fail: bool,
    pub rows: Mutex<Vec<RenderResult>>,
}

impl MemorySink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

impl ResultSink for MemorySink {
    fn insert(&self, result: &RenderResult) -> FramecastResult<()> {
        if self.fail {
            return Err(FramecastError::persistence("insert rejected: 409 Conflict"));
        }
        self.rows.lock().push(result.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Everything a service test needs to inspect afterwards.
pub struct Harness {
    pub service: RenderService,
    pub tracker: Arc<ProgressTracker>,
    pub pipeline: Arc<FakePipeline>,
    pub store: Arc<FakeStore>,
    pub sink: Arc<MemorySink>,
    pub progress: Arc<Mutex<Vec<f64>>>,
}

pub fn harness(fail_at: FailAt, settings: OrchestratorSettings, workers: usize) -> Harness {
    let progress = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&progress);
    let tracker = Arc::new(ProgressTracker::with_observer(Arc::new(move |_, _, p| {
        seen.lock().push(p)
    })));
    let pipeline = Arc::new(FakePipeline::new(fail_at, Arc::clone(&tracker)));
    let store = Arc::new(if fail_at == FailAt::Upload {
        FakeStore::failing()
    } else {
        FakeStore::default()
    });
    let sink = Arc::new(if fail_at == FailAt::Persist {
        MemorySink::failing()
    } else {
        MemorySink::default()
    });

    let orchestrator = Orchestrator::new(
        pipeline.clone(),
        store.clone(),
        sink.clone(),
        Arc::clone(&tracker),
        settings,
    );
    Harness {
        service: RenderService::new(orchestrator, workers),
        tracker,
        pipeline,
        store,
        sink,
        progress,
    }
}

/// A session directory with the three working dirs and a few frames.
pub fn session_dir(name: &str) -> SessionLayout {
    let dir = std::env::temp_dir().join(format!("framecast_it_{name}"));
    let _ = std::fs::remove_dir_all(&dir);
    let layout = SessionLayout::new(dir);
    layout.ensure_dirs().unwrap();
    for i in 1..=3 {
        std::fs::write(layout.frame_path(i), b"png").unwrap();
    }
    std::fs::write(layout.assets_dir().join("local.mp3"), b"mp3").unwrap();
    layout
}

pub fn job(user: &str, session: &str, layout: &SessionLayout) -> RenderJob {
    RenderJob {
        user_id: user.to_string(),
        session_id: session.to_string(),
        audio_timeline: vec![AudioTimelineEntry::new("local.mp3", 0)],
        duration: 5.0,
        session_dir: layout.root().to_path_buf(),
        resolution: Resolution::P720,
        category: "story".to_string(),
        template: "classic".to_string(),
        asset_load_time: 0.25,
        frame_write_time: 1.75,
    }
}
