//! Framecast Render Engine
//!
//! Turns a session directory of pre-rendered frames plus a sparse audio
//! timeline into a finished video.
//!
//! # Pipeline Architecture
//!
//! ```text
//! audioTimeline ──┐
//!                 ├── Resolve (download / locate)
//! assets/ ────────┘         │
//!                           ├── Decode + trim + overlay (60 fps offsets)
//!                           ▼
//!                      output.wav ─────────┐
//!                                          ├── Join (H.264 + AAC)
//! frames/frame%04d.png ── Mux (H.264) ─────┘         │
//!                      output.mp4                    ▼
//!                                                final.mp4
//! ```
//!
//! Cleanup of the working directories is handled by [`cleanup::SessionCleanup`].

pub mod cleanup;
pub mod codec;
pub mod compositor;
pub mod ffmpeg;
pub mod joiner;
pub mod layout;
pub mod muxer;
pub mod pcm;
pub mod pipeline;
pub mod resolver;

pub use cleanup::{CleanupReport, SessionCleanup};
pub use compositor::{AudioReport, TimelineCompositor};
pub use layout::SessionLayout;
pub use muxer::{FrameScan, MuxReport, VideoEncoding};
pub use pipeline::{FfmpegPipeline, RenderPipeline};
