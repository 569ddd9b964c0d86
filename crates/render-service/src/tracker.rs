//! Per-session progress records.
//!
//! Records are keyed by user, then session. Each record is owned by the
//! [`JobId`] that created it; a resubmission replaces the record and any
//! later write from the older job is rejected with
//! [`TrackerError::Superseded`]. A completed record is handed out exactly
//! once by [`ProgressTracker::fetch`], which removes it.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use framecast_job_model::job::JobKey;
use framecast_job_model::result::RenderResult;
use framecast_job_model::stage::{JobStatus, RenderStage};

/// Identity of one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct JobId(u64);

impl JobId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lookup and transition failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrackerError {
    #[error("no render found for {0}")]
    NotFound(JobKey),

    #[error("render for {key} is still in progress ({progress}%)")]
    NotReady { key: JobKey, progress: f64 },

    #[error("render for {key} failed: {reason}")]
    JobFailed { key: JobKey, reason: String },

    #[error("cannot move from {from} to {to}")]
    InvalidTransition { from: RenderStage, to: RenderStage },

    #[error("job {job_id} no longer owns {key}")]
    Superseded { key: JobKey, job_id: JobId },
}

/// Mutable state of one session's render.
#[derive(Debug, Clone)]
pub struct ProgressRecord {
    pub job_id: JobId,
    pub stage: RenderStage,
    pub status: JobStatus,
    pub error: Option<String>,
    pub result: Option<RenderResult>,
}

impl ProgressRecord {
    fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            stage: RenderStage::Submitted,
            status: JobStatus::Rendering,
            error: None,
            result: None,
        }
    }

    pub fn progress(&self) -> f64 {
        self.stage.progress()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            progress: self.progress(),
            stage: self.stage,
            status: self.status,
            error: self.error.clone(),
        }
    }
}

/// What a poll returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub progress: f64,
    pub stage: RenderStage,
    pub status: JobStatus,
    pub error: Option<String>,
}

/// Callback receiving every accepted progress value.
pub type ProgressObserver = Arc<dyn Fn(&JobKey, JobId, f64) + Send + Sync>;

type SessionMap = HashMap<String, ProgressRecord>;

/// Lock-protected store of progress records.
pub struct ProgressTracker {
    records: RwLock<HashMap<String, SessionMap>>,
    next_id: AtomicU64,
    observer: RwLock<Option<ProgressObserver>>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            observer: RwLock::new(None),
        }
    }

    pub fn with_observer(observer: ProgressObserver) -> Self {
        let tracker = Self::new();
        tracker.set_observer(observer);
        tracker
    }

    pub fn set_observer(&self, observer: ProgressObserver) {
        *self.observer.write() = Some(observer);
    }

    /// Register a submission at 75%, replacing any record for the key.
    pub fn start(&self, key: &JobKey) -> JobId {
        let job_id = JobId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let replaced = self
            .records
            .write()
            .entry(key.user_id.clone())
            .or_default()
            .insert(key.session_id.clone(), ProgressRecord::new(job_id));

        if let Some(previous) = replaced {
            tracing::warn!(
                key = %key,
                job_id = %job_id,
                superseded = %previous.job_id,
                "Resubmission replaces existing render"
            );
        }
        self.notify(key, job_id, RenderStage::Submitted.progress());
        job_id
    }

    /// Move the job to `stage`, which must directly follow the current one.
    ///
    /// [`RenderStage::Complete`] is only reachable through [`Self::complete`].
    pub fn advance(&self, key: &JobKey, job_id: JobId, stage: RenderStage) -> Result<(), TrackerError> {
        if stage.is_terminal() {
            return Err(TrackerError::InvalidTransition {
                from: RenderStage::Uploaded,
                to: stage,
            });
        }
        self.transition(key, job_id, stage, |_| {})
    }

    /// Enter the terminal stage with the result embedded.
    pub fn complete(&self, key: &JobKey, job_id: JobId, result: RenderResult) -> Result<(), TrackerError> {
        self.transition(key, job_id, RenderStage::Complete, move |record| {
            record.status = JobStatus::Complete;
            record.result = Some(result);
        })
    }

    /// Mark the job failed, keeping its last progress value.
    pub fn fail(&self, key: &JobKey, job_id: JobId, reason: impl Into<String>) -> Result<(), TrackerError> {
        let reason = reason.into();
        let mut records = self.records.write();
        let record = owned_record(&mut records, key, job_id)?;
        if record.status != JobStatus::Rendering {
            return Err(TrackerError::InvalidTransition {
                from: record.stage,
                to: record.stage,
            });
        }
        record.status = JobStatus::Failed;
        record.error = Some(reason.clone());
        tracing::error!(
            key = %key,
            job_id = %job_id,
            stage = %record.stage,
            reason = %reason,
            "Render failed"
        );
        Ok(())
    }

    /// Whether `job_id` still owns the record for `key`.
    pub fn owns(&self, key: &JobKey, job_id: JobId) -> bool {
        self.records
            .read()
            .get(&key.user_id)
            .and_then(|sessions| sessions.get(&key.session_id))
            .is_some_and(|record| record.job_id == job_id)
    }

    pub fn poll(&self, key: &JobKey) -> Result<ProgressSnapshot, TrackerError> {
        self.records
            .read()
            .get(&key.user_id)
            .and_then(|sessions| sessions.get(&key.session_id))
            .map(ProgressRecord::snapshot)
            .ok_or_else(|| TrackerError::NotFound(key.clone()))
    }

    /// Take the finished result, removing the record.
    ///
    /// A record still rendering is left in place. A failed record is
    /// removed and its reason returned.
    pub fn fetch(&self, key: &JobKey) -> Result<RenderResult, TrackerError> {
        let mut records = self.records.write();
        let sessions = records
            .get_mut(&key.user_id)
            .ok_or_else(|| TrackerError::NotFound(key.clone()))?;
        let record = sessions
            .get(&key.session_id)
            .ok_or_else(|| TrackerError::NotFound(key.clone()))?;

        if record.status == JobStatus::Rendering {
            return Err(TrackerError::NotReady {
                key: key.clone(),
                progress: record.progress(),
            });
        }

        let record = sessions
            .remove(&key.session_id)
            .ok_or_else(|| TrackerError::NotFound(key.clone()))?;
        if sessions.is_empty() {
            records.remove(&key.user_id);
        }
        drop(records);

        match (record.status, record.result) {
            (JobStatus::Complete, Some(result)) => Ok(result),
            _ => Err(TrackerError::JobFailed {
                key: key.clone(),
                reason: record.error.unwrap_or_else(|| "unknown failure".to_string()),
            }),
        }
    }

    /// Number of sessions with a live record for `user_id`.
    pub fn session_count(&self, user_id: &str) -> usize {
        self.records.read().get(user_id).map_or(0, HashMap::len)
    }

    pub fn user_count(&self) -> usize {
        self.records.read().len()
    }

    fn transition(
        &self,
        key: &JobKey,
        job_id: JobId,
        stage: RenderStage,
        apply: impl FnOnce(&mut ProgressRecord),
    ) -> Result<(), TrackerError> {
        {
            let mut records = self.records.write();
            let record = owned_record(&mut records, key, job_id)?;
            if record.status != JobStatus::Rendering || record.stage.next() != Some(stage) {
                return Err(TrackerError::InvalidTransition {
                    from: record.stage,
                    to: stage,
                });
            }
            record.stage = stage;
            apply(record);
        }
        tracing::debug!(key = %key, job_id = %job_id, stage = %stage, "Progress advanced");
        self.notify(key, job_id, stage.progress());
        Ok(())
    }

    fn notify(&self, key: &JobKey, job_id: JobId, progress: f64) {
        let observer = self.observer.read().clone();
        if let Some(observer) = observer {
            observer(key, job_id, progress);
        }
    }
}

impl fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("users", &self.user_count())
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

fn owned_record<'a>(
    records: &'a mut HashMap<String, SessionMap>,
    key: &JobKey,
    job_id: JobId,
) -> Result<&'a mut ProgressRecord, TrackerError> {
    let record = records
        .get_mut(&key.user_id)
        .and_then(|sessions| sessions.get_mut(&key.session_id))
        .ok_or_else(|| TrackerError::Superseded {
            key: key.clone(),
            job_id,
        })?;
    if record.job_id != job_id {
        return Err(TrackerError::Superseded {
            key: key.clone(),
            job_id,
        });
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use framecast_job_model::job::{AudioTimelineEntry, RenderJob, Resolution};
    use framecast_job_model::result::StageTimings;
    use parking_lot::Mutex;

    fn key(session: &str) -> JobKey {
        JobKey::new("user", session)
    }

    fn result_for(key: &JobKey) -> RenderResult {
        let job = RenderJob {
            user_id: key.user_id.clone(),
            session_id: key.session_id.clone(),
            audio_timeline: vec![AudioTimelineEntry::new("a.mp3", 0)],
            duration: 1.0,
            session_dir: "/tmp".into(),
            resolution: Resolution::P720,
            category: String::new(),
            template: String::new(),
            asset_load_time: 0.0,
            frame_write_time: 0.0,
        };
        RenderResult::new(&job, "http://x/v.mp4", StageTimings::default())
    }

    fn run_to_uploaded(tracker: &ProgressTracker, key: &JobKey, id: JobId) {
        for stage in [
            RenderStage::AudioDone,
            RenderStage::FramesDone,
            RenderStage::Muxed,
            RenderStage::Uploaded,
        ] {
            tracker.advance(key, id, stage).unwrap();
        }
    }

    #[test]
    fn test_start_reports_75() {
        let tracker = ProgressTracker::new();
        tracker.start(&key("s"));
        let snap = tracker.poll(&key("s")).unwrap();
        assert_eq!(snap.progress, 75.0);
        assert_eq!(snap.status, JobStatus::Rendering);
        assert!(snap.error.is_none());
    }

    #[test]
    fn test_observer_sees_every_value_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let tracker = ProgressTracker::with_observer(Arc::new(move |_, _, p| sink.lock().push(p)));

        let k = key("s");
        let id = tracker.start(&k);
        run_to_uploaded(&tracker, &k, id);
        tracker.complete(&k, id, result_for(&k)).unwrap();

        assert_eq!(*seen.lock(), vec![75.0, 85.0, 90.0, 95.0, 99.9, 100.0]);
    }

    #[test]
    fn test_skipping_or_repeating_a_stage_is_rejected() {
        let tracker = ProgressTracker::new();
        let k = key("s");
        let id = tracker.start(&k);

        let err = tracker.advance(&k, id, RenderStage::FramesDone).unwrap_err();
        assert!(matches!(err, TrackerError::InvalidTransition { .. }));

        tracker.advance(&k, id, RenderStage::AudioDone).unwrap();
        let err = tracker.advance(&k, id, RenderStage::AudioDone).unwrap_err();
        assert!(matches!(err, TrackerError::InvalidTransition { .. }));

        let err = tracker.advance(&k, id, RenderStage::Complete).unwrap_err();
        assert!(matches!(err, TrackerError::InvalidTransition { .. }));
        assert_eq!(tracker.poll(&k).unwrap().progress, 85.0);
    }

    #[test]
    fn test_fetch_once_then_not_found() {
        let tracker = ProgressTracker::new();
        let k = key("s");
        let id = tracker.start(&k);
        run_to_uploaded(&tracker, &k, id);
        tracker.complete(&k, id, result_for(&k)).unwrap();

        let result = tracker.fetch(&k).unwrap();
        assert_eq!(result.session_id, "s");
        assert_eq!(tracker.fetch(&k), Err(TrackerError::NotFound(k.clone())));
        assert!(matches!(tracker.poll(&k), Err(TrackerError::NotFound(_))));
        assert_eq!(tracker.user_count(), 0);
    }

    #[test]
    fn test_fetch_keeps_other_sessions_of_user() {
        let tracker = ProgressTracker::new();
        let (a, b) = (key("a"), key("b"));
        let id_a = tracker.start(&a);
        tracker.start(&b);
        run_to_uploaded(&tracker, &a, id_a);
        tracker.complete(&a, id_a, result_for(&a)).unwrap();

        tracker.fetch(&a).unwrap();
        assert_eq!(tracker.session_count("user"), 1);
        assert_eq!(tracker.user_count(), 1);
    }

    #[test]
    fn test_fetch_while_rendering_is_not_ready() {
        let tracker = ProgressTracker::new();
        let k = key("s");
        tracker.start(&k);
        assert!(matches!(tracker.fetch(&k), Err(TrackerError::NotReady { .. })));
        assert!(tracker.poll(&k).is_ok());
    }

    #[test]
    fn test_failed_record_surfaces_reason_then_disappears() {
        let tracker = ProgressTracker::new();
        let k = key("s");
        let id = tracker.start(&k);
        tracker.advance(&k, id, RenderStage::AudioDone).unwrap();
        tracker.fail(&k, id, "frames: ffmpeg exited 1").unwrap();

        let snap = tracker.poll(&k).unwrap();
        assert_eq!(snap.status, JobStatus::Failed);
        assert_eq!(snap.progress, 85.0);
        assert_eq!(snap.error.as_deref(), Some("frames: ffmpeg exited 1"));

        assert!(tracker.advance(&k, id, RenderStage::FramesDone).is_err());
        assert!(matches!(tracker.fetch(&k), Err(TrackerError::JobFailed { .. })));
        assert!(matches!(tracker.poll(&k), Err(TrackerError::NotFound(_))));
    }

    #[test]
    fn test_resubmission_supersedes_stale_job() {
        let tracker = ProgressTracker::new();
        let k = key("s");
        let old = tracker.start(&k);
        tracker.advance(&k, old, RenderStage::AudioDone).unwrap();

        let new = tracker.start(&k);
        assert!(new > old);
        assert!(!tracker.owns(&k, old));
        assert!(tracker.owns(&k, new));

        let err = tracker.advance(&k, old, RenderStage::FramesDone).unwrap_err();
        assert_eq!(err, TrackerError::Superseded { key: k.clone(), job_id: old });
        assert!(tracker.fail(&k, old, "late").is_err());

        let snap = tracker.poll(&k).unwrap();
        assert_eq!(snap.progress, 75.0);
        assert_eq!(snap.status, JobStatus::Rendering);
    }
}
