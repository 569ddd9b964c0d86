//! Timeline compositor: mixes a sparse audio timeline into one track.
//!
//! The master track is silence of exactly the session duration. Each
//! entry is resolved, decoded, optionally trimmed, and summed into the
//! master at `floor(frame * 1000 / 60)` ms. Entries that cannot be
//! resolved or decoded are skipped and counted; they never fail the stage.

use std::path::PathBuf;

use framecast_common::error::FramecastResult;
use framecast_common::timing::StageTimer;
use framecast_job_model::job::{AudioTimelineEntry, RenderJob};
use serde::Serialize;

use crate::codec::AudioCodec;
use crate::layout::SessionLayout;
use crate::pcm::PcmTrack;
use crate::resolver::AudioResolver;

/// Outcome of composing one session's audio.
#[derive(Debug, Clone, Serialize)]
pub struct AudioReport {
    pub output: PathBuf,
    pub duration_ms: u64,
    pub clips_mixed: usize,
    pub clips_skipped: usize,
    pub elapsed_secs: f64,
}

/// Builds the composed audio track for a job.
pub struct TimelineCompositor<'a> {
    resolver: &'a AudioResolver,
    codec: &'a dyn AudioCodec,
}

impl<'a> TimelineCompositor<'a> {
    pub fn new(resolver: &'a AudioResolver, codec: &'a dyn AudioCodec) -> Self {
        Self { resolver, codec }
    }

    /// Compose and export `<session>/output.wav`.
    pub fn compose(&self, job: &RenderJob, layout: &SessionLayout) -> FramecastResult<AudioReport> {
        let timer = StageTimer::start();
        std::fs::create_dir_all(layout.audio_dir())?;

        let mut master = PcmTrack::silent(job.duration_ms());
        let mut clips_mixed = 0usize;
        let mut clips_skipped = 0usize;

        for (index, entry) in job.audio_timeline.iter().enumerate() {
            match self.load_clip(entry, index, layout) {
                Ok(clip) => {
                    let offset_ms = entry.offset_ms();
                    let frames = master.overlay(&clip, offset_ms);
                    tracing::debug!(
                        index,
                        frame = entry.frame,
                        offset_ms,
                        clip_ms = clip.duration_ms(),
                        mixed_frames = frames,
                        "Overlaid timeline clip"
                    );
                    clips_mixed += 1;
                }
                Err(err) => {
                    tracing::warn!(
                        index,
                        audio = %entry.audio,
                        error = %err,
                        "Skipping timeline clip"
                    );
                    clips_skipped += 1;
                }
            }
        }

        let output = layout.composed_audio();
        self.codec.export_wav(&master, &output)?;

        let report = AudioReport {
            output,
            duration_ms: master.duration_ms(),
            clips_mixed,
            clips_skipped,
            elapsed_secs: timer.elapsed_secs(),
        };
        tracing::info!(
            clips_mixed,
            clips_skipped,
            duration_ms = report.duration_ms,
            elapsed_ms = timer.elapsed_ms(),
            "Timeline audio composed"
        );
        Ok(report)
    }

    fn load_clip(
        &self,
        entry: &AudioTimelineEntry,
        index: usize,
        layout: &SessionLayout,
    ) -> FramecastResult<PcmTrack> {
        let resolved = self.resolver.resolve(&entry.audio, index, layout)?;
        let mut clip = self.codec.decode(&resolved.path)?;
        if let Some(trim_ms) = entry.audio_duration {
            clip.truncate_ms(trim_ms);
        }
        Ok(clip)
    }
}
