//! On-disk layout of a session working directory.
//!
//! ```text
//! <session>/
//!   assets/          uploaded sounds, images, frame sequences
//!   audio/           scratch downloads (sound_0, sound_1, ...)
//!   frames/          frame0001.png, frame0002.png, ...
//!   output.wav       composed audio (intermediate)
//!   output.mp4       silent video (intermediate)
//!   final.mp4        deliverable
//! ```

use std::path::{Path, PathBuf};

/// printf-style pattern ffmpeg uses to read the frame sequence.
pub const FRAME_PATTERN: &str = "frame%04d.png";

/// Index of the first frame on disk.
pub const FIRST_FRAME_INDEX: u32 = 1;

/// Paths inside one session directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLayout {
    root: PathBuf,
}

impl SessionLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.root.join("assets")
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.root.join("audio")
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.root.join("frames")
    }

    /// Input pattern for the frame sequence.
    pub fn frame_pattern(&self) -> PathBuf {
        self.frames_dir().join(FRAME_PATTERN)
    }

    /// Path of frame `index` (1-based).
    pub fn frame_path(&self, index: u32) -> PathBuf {
        self.frames_dir().join(format!("frame{index:04}.png"))
    }

    /// Scratch destination for the `index`-th downloaded clip.
    pub fn scratch_audio(&self, index: usize) -> PathBuf {
        self.audio_dir().join(format!("sound_{index}"))
    }

    pub fn composed_audio(&self) -> PathBuf {
        self.root.join("output.wav")
    }

    pub fn silent_video(&self) -> PathBuf {
        self.root.join("output.mp4")
    }

    pub fn final_video(&self) -> PathBuf {
        self.root.join("final.mp4")
    }

    /// Working directories removed by cleanup.
    pub fn working_dirs(&self) -> [PathBuf; 3] {
        [self.assets_dir(), self.audio_dir(), self.frames_dir()]
    }

    /// Intermediate artifacts removed by cleanup.
    pub fn intermediates(&self) -> [PathBuf; 2] {
        [self.composed_audio(), self.silent_video()]
    }

    /// Create the working directories if missing.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in self.working_dirs() {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_rooted_in_session() {
        let layout = SessionLayout::new("/videos/u1/s1");
        assert_eq!(layout.frame_path(1), PathBuf::from("/videos/u1/s1/frames/frame0001.png"));
        assert_eq!(layout.frame_path(300), PathBuf::from("/videos/u1/s1/frames/frame0300.png"));
        assert_eq!(layout.scratch_audio(2), PathBuf::from("/videos/u1/s1/audio/sound_2"));
        assert_eq!(layout.final_video(), PathBuf::from("/videos/u1/s1/final.mp4"));
        assert!(layout.frame_pattern().ends_with("frames/frame%04d.png"));
    }

    #[test]
    fn test_final_video_is_not_cleaned() {
        let layout = SessionLayout::new("/s");
        assert!(!layout.intermediates().contains(&layout.final_video()));
        assert!(!layout.working_dirs().contains(&layout.final_video()));
    }
}
