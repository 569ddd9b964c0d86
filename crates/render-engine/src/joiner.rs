//! AV joiner: muxes the silent video with the composed audio.

use std::path::PathBuf;

use framecast_common::error::{FramecastError, FramecastResult};
use framecast_common::timing::StageTimer;

use crate::ffmpeg::FfmpegCommand;
use crate::layout::SessionLayout;
use crate::muxer::VideoEncoding;

const AUDIO_BITRATE: &str = "192k";

/// Produces `final.mp4` from `output.mp4` + `output.wav`.
#[derive(Debug, Clone, Default)]
pub struct AvJoiner {
    encoding: VideoEncoding,
}

impl AvJoiner {
    pub fn new(encoding: VideoEncoding) -> Self {
        Self { encoding }
    }

    /// Video and audio are both re-encoded; this is not a stream copy.
    pub fn command(&self, layout: &SessionLayout) -> FfmpegCommand {
        FfmpegCommand::new("av-join")
            .arg("-i")
            .path_arg(&layout.silent_video())
            .arg("-i")
            .path_arg(&layout.composed_audio())
            .args(["-map", "0:v:0", "-map", "1:a:0"])
            .args(["-c:v", "libx264", "-preset", self.encoding.preset.as_str()])
            .args(["-crf".to_string(), self.encoding.crf.to_string()])
            .args(["-pix_fmt", "yuv420p"])
            .args(["-c:a", "aac", "-b:a", AUDIO_BITRATE])
            .args(["-movflags", "+faststart"])
            .path_arg(&layout.final_video())
    }

    pub fn join(&self, layout: &SessionLayout) -> FramecastResult<PathBuf> {
        let timer = StageTimer::start();
        for input in layout.intermediates() {
            if !input.exists() {
                return Err(FramecastError::FileNotFound { path: input });
            }
        }

        self.command(layout).run()?;

        let output = layout.final_video();
        tracing::info!(
            output = %output.display(),
            elapsed_ms = timer.elapsed_ms(),
            "Audio and video joined"
        );
        Ok(output)
    }
}
