//! Removal of a session's working files.
//!
//! [`SessionCleanup`] is armed when a render starts. It runs once: either
//! explicitly after the AV join, or on drop if the render bails out
//! earlier. Paths that are already gone are not errors.

use std::io::ErrorKind;
use std::path::Path;

use framecast_common::error::FramecastResult;

use crate::layout::SessionLayout;

/// What a cleanup pass removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub dirs_removed: usize,
    pub files_removed: usize,
}

/// Scope guard deleting `assets/`, `audio/`, `frames/` and the intermediates.
#[derive(Debug)]
pub struct SessionCleanup {
    layout: SessionLayout,
    done: bool,
}

impl SessionCleanup {
    pub fn arm(layout: SessionLayout) -> Self {
        Self {
            layout,
            done: false,
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Give up ownership of the working files without touching them.
    ///
    /// Used when a newer submission took over the same session directory.
    pub fn disarm(&mut self) {
        self.done = true;
    }

    /// Remove the working files.
    ///
    /// Every path is attempted even when one fails; the first error is
    /// returned and the guard stays armed so a later call or drop retries.
    /// Once a pass succeeds, later calls are no-ops.
    pub fn run(&mut self) -> FramecastResult<CleanupReport> {
        if self.done {
            return Ok(CleanupReport::default());
        }

        let mut report = CleanupReport::default();
        let mut first_error = None;
        for dir in self.layout.working_dirs() {
            match remove(&dir, |p| std::fs::remove_dir_all(p)) {
                Ok(true) => report.dirs_removed += 1,
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(path = %dir.display(), error = %err, "Failed to remove directory");
                    first_error.get_or_insert(err);
                }
            }
        }
        for file in self.layout.intermediates() {
            match remove(&file, |p| std::fs::remove_file(p)) {
                Ok(true) => report.files_removed += 1,
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(path = %file.display(), error = %err, "Failed to remove file");
                    first_error.get_or_insert(err);
                }
            }
        }

        tracing::info!(
            session = %self.layout.root().display(),
            dirs = report.dirs_removed,
            files = report.files_removed,
            "Cleaned up session working files"
        );
        match first_error {
            Some(err) => Err(err),
            None => {
                self.done = true;
                Ok(report)
            }
        }
    }
}

impl Drop for SessionCleanup {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if let Err(err) = self.run() {
            tracing::warn!(
                session = %self.layout.root().display(),
                error = %err,
                "Cleanup after failed render did not complete"
            );
        }
    }
}

fn remove(path: &Path, op: impl FnOnce(&Path) -> std::io::Result<()>) -> FramecastResult<bool> {
    match op(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
