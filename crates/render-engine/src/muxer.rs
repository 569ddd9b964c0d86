//! Frame muxer: encodes the PNG frame sequence into a silent H.264 video.

use std::path::Path;

use framecast_common::error::FramecastResult;
use framecast_common::timing::StageTimer;
use serde::Serialize;

use crate::ffmpeg::FfmpegCommand;
use crate::layout::{SessionLayout, FIRST_FRAME_INDEX};

/// Encoder settings for the silent video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoEncoding {
    pub fps: u32,
    pub crf: u32,
    pub preset: String,
}

impl Default for VideoEncoding {
    fn default() -> Self {
        Self {
            fps: 60,
            crf: 23,
            preset: "medium".to_string(),
        }
    }
}

/// What the frame directory actually contains.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FrameScan {
    pub frame_count: usize,
    pub first_index: Option<u32>,
    pub last_index: Option<u32>,
    /// First index missing from an otherwise contiguous run.
    pub first_gap: Option<u32>,
}

impl FrameScan {
    /// Whether ffmpeg will read every frame: starts at 0001, no gaps.
    pub fn is_contiguous(&self) -> bool {
        self.frame_count > 0 && self.first_index == Some(FIRST_FRAME_INDEX) && self.first_gap.is_none()
    }
}

/// Inventory `frameNNNN.png` files in `dir`. Other files are ignored.
pub fn scan_frames(dir: &Path) -> FramecastResult<FrameScan> {
    let mut indices: Vec<u32> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| parse_frame_index(&entry.file_name().to_string_lossy()))
        .collect();
    indices.sort_unstable();
    indices.dedup();

    let first_gap = match indices.first() {
        Some(&first) if first != FIRST_FRAME_INDEX => Some(FIRST_FRAME_INDEX),
        _ => indices
            .windows(2)
            .find(|pair| pair[1] != pair[0] + 1)
            .map(|pair| pair[0] + 1),
    };

    Ok(FrameScan {
        frame_count: indices.len(),
        first_index: indices.first().copied(),
        last_index: indices.last().copied(),
        first_gap,
    })
}

fn parse_frame_index(name: &str) -> Option<u32> {
    let digits = name.strip_prefix("frame")?.strip_suffix(".png")?;
    if digits.len() < 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Outcome of muxing one session's frames.
#[derive(Debug, Clone, Serialize)]
pub struct MuxReport {
    pub scan: FrameScan,
    pub elapsed_secs: f64,
}

/// Encodes `frames/frame%04d.png` into `output.mp4`.
#[derive(Debug, Clone, Default)]
pub struct FrameMuxer {
    encoding: VideoEncoding,
}

impl FrameMuxer {
    pub fn new(encoding: VideoEncoding) -> Self {
        Self { encoding }
    }

    /// ffmpeg invocation for a session.
    pub fn command(&self, layout: &SessionLayout) -> FfmpegCommand {
        let fps = self.encoding.fps.to_string();
        FfmpegCommand::new("frame-mux")
            .args(["-framerate", fps.as_str()])
            .args(["-start_number".to_string(), FIRST_FRAME_INDEX.to_string()])
            .arg("-i")
            .path_arg(&layout.frame_pattern())
            .args(["-c:v", "libx264", "-preset", self.encoding.preset.as_str()])
            .args(["-crf".to_string(), self.encoding.crf.to_string()])
            .args(["-pix_fmt", "yuv420p", "-r", fps.as_str()])
            .path_arg(&layout.silent_video())
    }

    /// Encode the frame sequence.
    ///
    /// A gapped sequence is only logged: ffmpeg stops at the first
    /// missing index and the video comes out short.
    pub fn mux(&self, layout: &SessionLayout) -> FramecastResult<MuxReport> {
        let timer = StageTimer::start();
        let scan = scan_frames(&layout.frames_dir())?;
        if !scan.is_contiguous() {
            tracing::warn!(
                frames = scan.frame_count,
                first_index = ?scan.first_index,
                first_gap = ?scan.first_gap,
                "Frame sequence is not contiguous; video will be truncated"
            );
        }

        self.command(layout).run()?;

        tracing::info!(
            frames = scan.frame_count,
            fps = self.encoding.fps,
            elapsed_ms = timer.elapsed_ms(),
            output = %layout.silent_video().display(),
            "Frames muxed"
        );
        Ok(MuxReport {
            scan,
            elapsed_secs: timer.elapsed_secs(),
        })
    }
}
