//! Locating the bytes behind each audio timeline entry.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use framecast_common::error::{FramecastError, FramecastResult};
use framecast_job_model::job::AudioSource;

use crate::layout::SessionLayout;

/// Query parameter asking the remote host for WAV output.
const DOWNLOAD_FORMAT: (&str, &str) = ("downloadformat", "wav");

/// A timeline entry's audio, readable from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAudio {
    pub path: PathBuf,
    /// Whether the file was downloaded into the session's scratch area.
    pub downloaded: bool,
}

/// Turns [`AudioSource`]s into local files.
pub struct AudioResolver {
    asset_root: PathBuf,
    timeout: Duration,
    // Built on first use: the blocking client must not be created on an
    // async runtime thread.
    client: OnceLock<reqwest::blocking::Client>,
}

impl AudioResolver {
    pub fn new(asset_root: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            asset_root: asset_root.into(),
            timeout,
            client: OnceLock::new(),
        }
    }

    /// Resolve the `index`-th entry of a session's timeline.
    pub fn resolve(
        &self,
        source: &AudioSource,
        index: usize,
        layout: &SessionLayout,
    ) -> FramecastResult<ResolvedAudio> {
        match source {
            AudioSource::Remote(url) => {
                let path = layout.scratch_audio(index);
                self.download(url, &path)?;
                Ok(ResolvedAudio {
                    path,
                    downloaded: true,
                })
            }
            AudioSource::Local(reference) => {
                let path = self.locate_local(reference, layout)?;
                Ok(ResolvedAudio {
                    path,
                    downloaded: false,
                })
            }
        }
    }

    /// Candidate locations for a local reference, in lookup order.
    pub fn local_candidates(&self, reference: &Path, layout: &SessionLayout) -> Vec<PathBuf> {
        if reference.is_absolute() {
            return vec![reference.to_path_buf()];
        }
        let assets = layout.assets_dir();
        vec![
            assets.join("sounds").join(reference),
            assets.join(reference),
            self.asset_root.join(reference),
        ]
    }

    fn locate_local(&self, reference: &Path, layout: &SessionLayout) -> FramecastResult<PathBuf> {
        self.local_candidates(reference, layout)
            .into_iter()
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| FramecastError::FileNotFound {
                path: reference.to_path_buf(),
            })
    }

    fn client(&self) -> FramecastResult<&reqwest::blocking::Client> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| FramecastError::http(format!("Failed to build HTTP client: {e}")))?;
        Ok(self.client.get_or_init(|| client))
    }

    fn download(&self, url: &str, dest: &Path) -> FramecastResult<()> {
        let started = std::time::Instant::now();
        let response = self
            .client()?
            .get(url)
            .query(&[DOWNLOAD_FORMAT])
            .send()
            .map_err(|e| FramecastError::http(format!("GET {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FramecastError::http(format!("GET {url}: status {status}")));
        }

        let bytes = response
            .bytes()
            .map_err(|e| FramecastError::http(format!("GET {url}: {e}")))?;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dest, &bytes)?;

        tracing::debug!(
            url,
            dest = %dest.display(),
            bytes = bytes.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "Downloaded timeline audio"
        );
        Ok(())
    }
}

impl std::fmt::Debug for AudioResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioResolver")
            .field("asset_root", &self.asset_root)
            .field("timeout", &self.timeout)
            .finish()
    }
}
