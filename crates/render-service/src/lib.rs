//! Framecast Render Service
//!
//! Accepts render jobs, runs them on a bounded pool of blocking workers,
//! and exposes progress and the one-shot result handoff.
//!
//! ```text
//! submit ──► ProgressTracker.start (75%)
//!        └─► tokio task ─► Semaphore permit ─► spawn_blocking(Orchestrator::run)
//!                                                 │
//! poll ◄── ProgressTracker ◄──── advance / fail / complete
//! fetch ─► ProgressTracker.fetch (removes record)
//! ```

pub mod http;
pub mod orchestrator;
pub mod service;
pub mod tracker;

pub use http::{app, router, serve};
pub use orchestrator::{Orchestrator, OrchestratorSettings, RenderOutcome, Step};
pub use service::{RenderHandle, RenderService};
pub use tracker::{JobId, ProgressObserver, ProgressSnapshot, ProgressTracker, TrackerError};
