//! In-memory PCM audio and additive mixing.
//!
//! Tracks are interleaved signed 16-bit samples. Overlaying sums sample
//! values and saturates at the i16 range, so overlapping clips are heard
//! together instead of one replacing the other.

/// Sample rate every clip is decoded to.
pub const SAMPLE_RATE: u32 = 44_100;

/// Channel count every clip is decoded to.
pub const CHANNELS: u16 = 2;

/// Interleaved 16-bit PCM audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmTrack {
    sample_rate: u32,
    channels: u16,
    samples: Vec<i16>,
}

impl PcmTrack {
    /// A silent track exactly `duration_ms` long.
    pub fn silent(duration_ms: u64) -> Self {
        Self::silent_with(duration_ms, SAMPLE_RATE, CHANNELS)
    }

    pub fn silent_with(duration_ms: u64, sample_rate: u32, channels: u16) -> Self {
        let frames = ms_to_frames(duration_ms, sample_rate);
        Self {
            sample_rate,
            channels,
            samples: vec![0; frames * channels as usize],
        }
    }

    /// Wrap already-interleaved samples. A trailing partial frame is dropped.
    pub fn from_samples(samples: Vec<i16>, sample_rate: u32, channels: u16) -> Self {
        let mut samples = samples;
        let whole = samples.len() - samples.len() % channels.max(1) as usize;
        samples.truncate(whole);
        Self {
            sample_rate,
            channels: channels.max(1),
            samples,
        }
    }

    /// Decode little-endian s16 bytes as produced by `-f s16le`.
    pub fn from_le_bytes(bytes: &[u8], sample_rate: u32, channels: u16) -> Self {
        let samples = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Self::from_samples(samples, sample_rate, channels)
    }

    /// Encode as little-endian s16 bytes.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.samples.len() * 2);
        for sample in &self.samples {
            out.extend_from_slice(&sample.to_le_bytes());
        }
        out
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Number of sample frames (one sample per channel).
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Length in whole milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.frame_count() as u64 * 1000 / self.sample_rate as u64
    }

    /// Keep only `[0, duration_ms)`.
    pub fn truncate_ms(&mut self, duration_ms: u64) {
        let frames = ms_to_frames(duration_ms, self.sample_rate);
        self.samples
            .truncate(frames.saturating_mul(self.channels as usize));
    }

    /// Mix `clip` into this track starting at `offset_ms`.
    ///
    /// Whatever runs past the end of this track is dropped. Returns the
    /// number of sample frames actually mixed.
    pub fn overlay(&mut self, clip: &PcmTrack, offset_ms: u64) -> usize {
        debug_assert_eq!(clip.sample_rate, self.sample_rate);
        debug_assert_eq!(clip.channels, self.channels);

        let start = ms_to_frames(offset_ms, self.sample_rate) * self.channels as usize;
        if start >= self.samples.len() {
            return 0;
        }

        let target = &mut self.samples[start..];
        let mixed = target.len().min(clip.samples.len());
        for (dst, src) in target.iter_mut().zip(&clip.samples) {
            *dst = dst.saturating_add(*src);
        }
        mixed / self.channels as usize
    }

    /// Peak absolute amplitude within `[from_ms, to_ms)`.
    pub fn peak_between(&self, from_ms: u64, to_ms: u64) -> i16 {
        let channels = self.channels as usize;
        let start = (ms_to_frames(from_ms, self.sample_rate) * channels).min(self.samples.len());
        let end = (ms_to_frames(to_ms, self.sample_rate) * channels).min(self.samples.len());
        self.samples[start..end.max(start)]
            .iter()
            .map(|s| s.saturating_abs())
            .max()
            .unwrap_or(0)
    }

    /// Offset in milliseconds of the first non-zero sample.
    pub fn onset_ms(&self) -> Option<u64> {
        let index = self.samples.iter().position(|s| *s != 0)?;
        let frame = (index / self.channels as usize) as u64;
        Some(frame * 1000 / self.sample_rate as u64)
    }
}

fn ms_to_frames(ms: u64, sample_rate: u32) -> usize {
    (ms * sample_rate as u64 / 1000) as usize
}
