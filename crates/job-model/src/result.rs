//! Render results and their timing breakdown.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job::RenderJob;

/// Seconds spent in each phase of producing one video.
///
/// The first two come from the upstream frame writer; the rest are
/// measured by the render pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StageTimings {
    pub asset_load_time: f64,
    pub frame_write_time: f64,
    pub audio_creation_time: f64,
    pub frame_combination_time: f64,
    pub audio_video_integration_time: f64,
    pub upload_time: f64,
}

impl StageTimings {
    /// Seed the upstream fields from a submission.
    pub fn from_job(job: &RenderJob) -> Self {
        Self {
            asset_load_time: job.asset_load_time,
            frame_write_time: job.frame_write_time,
            ..Self::default()
        }
    }

    /// Sum of all six phases.
    pub fn total(&self) -> f64 {
        self.asset_load_time
            + self.frame_write_time
            + self.audio_creation_time
            + self.frame_combination_time
            + self.audio_video_integration_time
            + self.upload_time
    }
}

/// The durable record of a finished render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderResult {
    /// Public location of the published video.
    pub url: String,

    pub user_id: String,
    pub session_id: String,
    pub category: String,
    pub template: String,
    pub resolution: String,

    /// Output length in seconds.
    pub duration: f64,

    #[serde(flatten)]
    pub timings: StageTimings,

    /// Always `timings.total()`.
    pub total_time: f64,

    pub created_at: DateTime<Utc>,
}

impl RenderResult {
    pub fn new(job: &RenderJob, url: impl Into<String>, timings: StageTimings) -> Self {
        Self {
            url: url.into(),
            user_id: job.user_id.clone(),
            session_id: job.session_id.clone(),
            category: job.category.clone(),
            template: job.template.clone(),
            resolution: job.resolution.label().to_string(),
            duration: job.duration,
            total_time: timings.total(),
            timings,
            created_at: Utc::now(),
        }
    }
}
