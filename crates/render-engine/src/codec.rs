//! Decoding clips to PCM and exporting the mixed track.

use std::path::Path;

use framecast_common::error::{FramecastError, FramecastResult};

use crate::ffmpeg::FfmpegCommand;
use crate::pcm::{PcmTrack, CHANNELS, SAMPLE_RATE};

/// Converts between audio files and [`PcmTrack`]s.
pub trait AudioCodec: Send + Sync {
    /// Decode any supported container to PCM at [`SAMPLE_RATE`]/[`CHANNELS`].
    fn decode(&self, path: &Path) -> FramecastResult<PcmTrack>;

    /// Write `track` as a WAV file.
    fn export_wav(&self, track: &PcmTrack, path: &Path) -> FramecastResult<()>;
}

/// Codec backed by the ffmpeg binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegAudioCodec;

impl AudioCodec for FfmpegAudioCodec {
    fn decode(&self, path: &Path) -> FramecastResult<PcmTrack> {
        if !path.exists() {
            return Err(FramecastError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let bytes = FfmpegCommand::new("decode-clip")
            .arg("-i")
            .path_arg(path)
            .args(["-vn", "-f", "s16le", "-acodec", "pcm_s16le"])
            .args(["-ac".to_string(), CHANNELS.to_string()])
            .args(["-ar".to_string(), SAMPLE_RATE.to_string()])
            .arg("pipe:1")
            .run_capture()
            .map_err(|e| FramecastError::audio(format!("{}: {e}", path.display())))?;

        Ok(PcmTrack::from_le_bytes(&bytes, SAMPLE_RATE, CHANNELS))
    }

    fn export_wav(&self, track: &PcmTrack, path: &Path) -> FramecastResult<()> {
        FfmpegCommand::new("export-wav")
            .args(["-f", "s16le"])
            .args(["-ar".to_string(), track.sample_rate().to_string()])
            .args(["-ac".to_string(), track.channels().to_string()])
            .args(["-i", "pipe:0", "-c:a", "pcm_s16le"])
            .path_arg(path)
            .run_with_stdin(&track.to_le_bytes())
            .map_err(|e| FramecastError::audio(format!("{}: {e}", path.display())))
    }
}
