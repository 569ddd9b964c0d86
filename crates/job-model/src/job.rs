//! Render job submissions and their audio timelines.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Frame rate of the timebase audio timeline entries are authored against.
///
/// Timeline frames are converted to milliseconds with this rate even when
/// the muxed video runs at a different one. Changing it shifts every clip.
pub const TIMELINE_FPS: u64 = 60;

/// Composite identity of a render: not unique across users on its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobKey {
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(rename = "sessionID")]
    pub session_id: String,
}

impl JobKey {
    pub fn new(user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.user_id, self.session_id)
    }
}

/// Where the bytes for one timeline entry come from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AudioSource {
    /// An `http(s)` URL fetched at render time.
    Remote(String),
    /// A path to an asset already on disk.
    Local(PathBuf),
}

impl AudioSource {
    /// Classify a raw timeline reference.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::Remote(trimmed.to_string())
        } else {
            Self::Local(PathBuf::from(trimmed))
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

impl From<String> for AudioSource {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<AudioSource> for String {
    fn from(source: AudioSource) -> Self {
        match source {
            AudioSource::Remote(url) => url,
            AudioSource::Local(path) => path.display().to_string(),
        }
    }
}

impl fmt::Display for AudioSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(url) => f.write_str(url),
            Self::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// One scheduled audio insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTimelineEntry {
    /// Clip to insert.
    pub audio: AudioSource,

    /// Frame index (60 fps timebase) at which the clip starts.
    pub frame: u64,

    /// Trim the clip to its first `audio_duration` milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_duration: Option<u64>,
}

impl AudioTimelineEntry {
    pub fn new(audio: impl AsRef<str>, frame: u64) -> Self {
        Self {
            audio: AudioSource::parse(audio.as_ref()),
            frame,
            audio_duration: None,
        }
    }

    pub fn trimmed(mut self, audio_duration_ms: u64) -> Self {
        self.audio_duration = Some(audio_duration_ms);
        self
    }

    /// Insertion offset in milliseconds: `floor(frame * 1000 / 60)`.
    pub fn offset_ms(&self) -> u64 {
        self.frame * 1000 / TIMELINE_FPS
    }
}

/// Output resolution label chosen by the client.
///
/// Frames arrive already rendered at this size; the label is echoed into
/// the result and never drives scaling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Resolution {
    P480,
    #[default]
    P720,
    P1080,
    Custom(String),
}

impl Resolution {
    pub fn label(&self) -> &str {
        match self {
            Self::P480 => "480p",
            Self::P720 => "720p",
            Self::P1080 => "1080p",
            Self::Custom(label) => label,
        }
    }
}

impl From<String> for Resolution {
    fn from(label: String) -> Self {
        match label.as_str() {
            "480p" => Self::P480,
            "720p" => Self::P720,
            "1080p" => Self::P1080,
            _ => Self::Custom(label),
        }
    }
}

impl From<Resolution> for String {
    fn from(resolution: Resolution) -> Self {
        resolution.label().to_string()
    }
}

/// A render submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderJob {
    #[serde(rename = "userID")]
    pub user_id: String,

    #[serde(rename = "sessionID")]
    pub session_id: String,

    /// Audio insertions in authoring order.
    #[serde(default)]
    pub audio_timeline: Vec<AudioTimelineEntry>,

    /// Output length in seconds.
    pub duration: f64,

    /// Working directory holding `assets/`, `audio/` and `frames/`.
    pub session_dir: PathBuf,

    #[serde(default)]
    pub resolution: Resolution,

    #[serde(default)]
    pub category: String,

    #[serde(default)]
    pub template: String,

    /// Seconds the upstream collaborator spent loading assets.
    #[serde(default)]
    pub asset_load_time: f64,

    /// Seconds the upstream collaborator spent writing frames.
    #[serde(default)]
    pub frame_write_time: f64,
}

impl RenderJob {
    pub fn key(&self) -> JobKey {
        JobKey::new(&self.user_id, &self.session_id)
    }

    /// Length of the master audio track in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        (self.duration * 1000.0).round() as u64
    }

    /// Check the submission before any state is created for it.
    pub fn validate(&self) -> Result<(), JobError> {
        if self.user_id.trim().is_empty() {
            return Err(JobError::MissingField("userID"));
        }
        if self.session_id.trim().is_empty() {
            return Err(JobError::MissingField("sessionID"));
        }
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(JobError::InvalidDuration(self.duration));
        }
        if !self.session_dir.is_dir() {
            return Err(JobError::MissingSessionDir(self.session_dir.clone()));
        }
        for (field, value) in [
            ("assetLoadTime", self.asset_load_time),
            ("frameWriteTime", self.frame_write_time),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(JobError::InvalidTiming { field, value });
            }
        }
        Ok(())
    }
}

/// Reasons a submission is rejected.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("missing required field {0}")]
    MissingField(&'static str),

    #[error("duration must be a positive number of seconds, got {0}")]
    InvalidDuration(f64),

    #[error("session directory {0} does not exist")]
    MissingSessionDir(PathBuf),

    #[error("{field} must be a non-negative number of seconds, got {value}")]
    InvalidTiming { field: &'static str, value: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_job(session_dir: PathBuf) -> RenderJob {
        RenderJob {
            user_id: "user-1".to_string(),
            session_id: "42".to_string(),
            audio_timeline: vec![AudioTimelineEntry::new("local.mp3", 0)],
            duration: 5.0,
            session_dir,
            resolution: Resolution::P720,
            category: "bounce".to_string(),
            template: "square-box".to_string(),
            asset_load_time: 0.4,
            frame_write_time: 2.1,
        }
    }

    #[test]
    fn test_audio_source_classification() {
        assert!(AudioSource::parse("https://cdn.example.com/a.wav").is_remote());
        assert!(AudioSource::parse("HTTP://cdn.example.com/a.wav").is_remote());
        assert_eq!(
            AudioSource::parse("./assets/boing.mp3"),
            AudioSource::Local(PathBuf::from("./assets/boing.mp3"))
        );
    }

    #[test]
    fn test_offset_uses_sixty_fps_timebase() {
        assert_eq!(AudioTimelineEntry::new("a.mp3", 60).offset_ms(), 1000);
        assert_eq!(AudioTimelineEntry::new("a.mp3", 0).offset_ms(), 0);
        // floor(1 * 1000 / 60) = 16
        assert_eq!(AudioTimelineEntry::new("a.mp3", 1).offset_ms(), 16);
        assert_eq!(AudioTimelineEntry::new("a.mp3", 90).offset_ms(), 1500);
    }

    #[test]
    fn test_job_deserializes_wire_names() {
        let json = r#"{
            "userID": "u1",
            "sessionID": "s9",
            "audioTimeline": [
                {"audio": "https://x.test/song", "frame": 120, "audio_duration": 750},
                {"audio": "assets/sounds/pop.mp3", "frame": 3}
            ],
            "duration": 10,
            "sessionDir": "/tmp/videos/u1/s9",
            "resolution": "1080p",
            "category": "particles",
            "template": "particle-ring",
            "assetLoadTime": 1.25,
            "frameWriteTime": 8.5
        }"#;
        let job: RenderJob = serde_json::from_str(json).unwrap();
        assert_eq!(job.key(), JobKey::new("u1", "s9"));
        assert_eq!(job.audio_timeline.len(), 2);
        assert_eq!(job.audio_timeline[0].audio_duration, Some(750));
        assert!(job.audio_timeline[0].audio.is_remote());
        assert_eq!(job.audio_timeline[1].audio_duration, None);
        assert_eq!(job.resolution, Resolution::P1080);
        assert_eq!(job.duration_ms(), 10_000);
        assert!((job.frame_write_time - 8.5).abs() < 1e-9);
    }

    #[test]
    fn test_job_optional_fields_default() {
        let json = r#"{"userID": "u", "sessionID": "s", "duration": 3, "sessionDir": "/tmp"}"#;
        let job: RenderJob = serde_json::from_str(json).unwrap();
        assert!(job.audio_timeline.is_empty());
        assert_eq!(job.resolution, Resolution::P720);
        assert_eq!(job.asset_load_time, 0.0);
    }

    #[test]
    fn test_custom_resolution_is_echoed() {
        let res: Resolution = serde_json::from_str("\"square\"").unwrap();
        assert_eq!(res, Resolution::Custom("square".to_string()));
        assert_eq!(serde_json::to_string(&res).unwrap(), "\"square\"");
        let standard: Resolution = serde_json::from_str("\"480p\"").unwrap();
        assert_eq!(standard, Resolution::P480);
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        let dir = std::env::temp_dir().join("framecast_test_job_validate");
        std::fs::create_dir_all(&dir).unwrap();

        assert!(sample_job(dir.clone()).validate().is_ok());

        let mut job = sample_job(dir.clone());
        job.duration = 0.0;
        assert!(matches!(job.validate(), Err(JobError::InvalidDuration(_))));

        let mut job = sample_job(dir.clone());
        job.user_id = " ".to_string();
        assert!(matches!(job.validate(), Err(JobError::MissingField("userID"))));

        let mut job = sample_job(dir.join("missing"));
        job.session_id = "x".to_string();
        assert!(matches!(job.validate(), Err(JobError::MissingSessionDir(_))));

        let mut job = sample_job(dir.clone());
        job.frame_write_time = -1.0;
        assert!(matches!(job.validate(), Err(JobError::InvalidTiming { .. })));

        std::fs::remove_dir_all(&dir).ok();
    }

    proptest! {
        #[test]
        fn prop_offset_is_monotonic_and_floors(frame in 0u64..10_000_000) {
            let here = AudioTimelineEntry::new("a.wav", frame).offset_ms();
            let next = AudioTimelineEntry::new("a.wav", frame + 1).offset_ms();
            prop_assert!(next >= here);
            prop_assert!(here * 60 <= frame * 1000);
            prop_assert!((here + 1) * 60 > frame * 1000);
        }
    }
}
