//! Framecast Job Model
//!
//! Defines the data contracts shared by the render pipeline and the
//! service that drives it:
//! - **Job:** a render submission keyed by `(userID, sessionID)` with its
//!   sparse audio timeline
//! - **Stage:** the ordered render phases and the progress each one reports
//! - **Result:** the published artifact URL plus the timing breakdown that
//!   gets persisted
//!
//! Audio timeline offsets are authored against a fixed 60 fps timebase
//! ([`TIMELINE_FPS`]) no matter what rate the video is encoded at.

pub mod job;
pub mod result;
pub mod stage;

pub use job::*;
pub use result::*;
pub use stage::*;
