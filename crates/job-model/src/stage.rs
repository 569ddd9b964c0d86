//! Render stages and the progress each one reports.
//!
//! A render only ever moves forward through these stages. The first
//! 75% of perceived progress belongs to frame writing, which happens
//! upstream before a job is submitted here.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Ordered render phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderStage {
    /// Accepted; frames are already on disk.
    Submitted,
    /// Timeline audio composed.
    AudioDone,
    /// Frames muxed into a silent video.
    FramesDone,
    /// Audio and video joined into the deliverable.
    Muxed,
    /// Deliverable uploaded.
    Uploaded,
    /// Result recorded and ready to fetch.
    Complete,
}

impl RenderStage {
    pub const ALL: [RenderStage; 6] = [
        Self::Submitted,
        Self::AudioDone,
        Self::FramesDone,
        Self::Muxed,
        Self::Uploaded,
        Self::Complete,
    ];

    /// Progress percentage reported while in this stage.
    pub fn progress(self) -> f64 {
        match self {
            Self::Submitted => 75.0,
            Self::AudioDone => 85.0,
            Self::FramesDone => 90.0,
            Self::Muxed => 95.0,
            Self::Uploaded => 99.9,
            Self::Complete => 100.0,
        }
    }

    /// The only stage this one may advance to.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Submitted => Some(Self::AudioDone),
            Self::AudioDone => Some(Self::FramesDone),
            Self::FramesDone => Some(Self::Muxed),
            Self::Muxed => Some(Self::Uploaded),
            Self::Uploaded => Some(Self::Complete),
            Self::Complete => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Complete
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::AudioDone => "audio_done",
            Self::FramesDone => "frames_done",
            Self::Muxed => "muxed",
            Self::Uploaded => "uploaded",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for RenderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse job status exposed to pollers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Rendering,
    Complete,
    Failed,
}
