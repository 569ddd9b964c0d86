//! The three encode stages behind one seam.

use std::path::PathBuf;
use std::time::Duration;

use framecast_common::config::RenderSettings;
use framecast_common::error::FramecastResult;
use framecast_job_model::job::RenderJob;

use crate::codec::{AudioCodec, FfmpegAudioCodec};
use crate::compositor::{AudioReport, TimelineCompositor};
use crate::ffmpeg::command_exists;
use crate::joiner::AvJoiner;
use crate::layout::SessionLayout;
use crate::muxer::{FrameMuxer, MuxReport, VideoEncoding};
use crate::resolver::AudioResolver;

/// Trait for render backends driving the encode stages of one job.
pub trait RenderPipeline: Send + Sync {
    /// Compose the audio timeline into `output.wav`.
    fn compose_audio(&self, job: &RenderJob, layout: &SessionLayout)
        -> FramecastResult<AudioReport>;

    /// Encode the frame sequence into `output.mp4`.
    fn mux_frames(&self, layout: &SessionLayout) -> FramecastResult<MuxReport>;

    /// Join audio and video into `final.mp4`, returning its path.
    fn join_av(&self, layout: &SessionLayout) -> FramecastResult<PathBuf>;

    /// Check if this backend is available on the system.
    fn is_available(&self) -> bool;

    /// Backend name.
    fn name(&self) -> &str;
}

/// ffmpeg-backed pipeline.
#[derive(Debug)]
pub struct FfmpegPipeline {
    resolver: AudioResolver,
    codec: FfmpegAudioCodec,
    muxer: FrameMuxer,
    joiner: AvJoiner,
}

impl FfmpegPipeline {
    pub fn new(settings: &RenderSettings) -> Self {
        let encoding = VideoEncoding {
            fps: settings.fps,
            crf: settings.crf,
            preset: settings.preset.clone(),
        };
        Self {
            resolver: AudioResolver::new(
                &settings.asset_root,
                Duration::from_secs(settings.fetch_timeout_secs),
            ),
            codec: FfmpegAudioCodec,
            muxer: FrameMuxer::new(encoding.clone()),
            joiner: AvJoiner::new(encoding),
        }
    }
}

impl RenderPipeline for FfmpegPipeline {
    fn compose_audio(
        &self,
        job: &RenderJob,
        layout: &SessionLayout,
    ) -> FramecastResult<AudioReport> {
        let codec: &dyn AudioCodec = &self.codec;
        TimelineCompositor::new(&self.resolver, codec).compose(job, layout)
    }

    fn mux_frames(&self, layout: &SessionLayout) -> FramecastResult<MuxReport> {
        self.muxer.mux(layout)
    }

    fn join_av(&self, layout: &SessionLayout) -> FramecastResult<PathBuf> {
        self.joiner.join(layout)
    }

    fn is_available(&self) -> bool {
        command_exists("ffmpeg")
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}
