//! Artifact stores: where finished videos go.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use framecast_common::config::DEFAULT_CHUNK_SIZE;
use framecast_common::error::{FramecastError, FramecastResult};
use framecast_common::timing::StageTimer;

/// Deterministic storage key for a session's video.
pub fn object_key(user_id: &str, session_id: &str) -> String {
    format!("{user_id}/videos/video_{session_id}.mp4")
}

/// Trait for destinations that accept a finished video.
pub trait ArtifactStore: Send + Sync {
    /// Upload `path` under `object_key`, returning its public URL.
    fn upload(&self, path: &Path, object_key: &str) -> FramecastResult<String>;

    /// Store name.
    fn name(&self) -> &str;
}

/// Fill `buf` from `reader`, stopping early only at end of input.
pub(crate) fn read_chunk(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Copies artifacts into a local directory, served by `framecast serve`.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
    public_base_url: String,
    chunk_size: usize,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn public_url(&self, object_key: &str) -> String {
        format!("{}/{}", self.public_base_url.trim_end_matches('/'), object_key)
    }
}

impl ArtifactStore for LocalArtifactStore {
    fn upload(&self, path: &Path, object_key: &str) -> FramecastResult<String> {
        if !path.is_file() {
            return Err(FramecastError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let timer = StageTimer::start();
        let dest = self.root.join(object_key);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut src = File::open(path)?;
        let mut out = File::create(&dest)?;
        let mut buf = vec![0u8; self.chunk_size];
        let mut chunks = 0usize;
        let mut total = 0u64;
        loop {
            let n = read_chunk(&mut src, &mut buf)?;
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n])?;
            chunks += 1;
            total += n as u64;
        }
        out.flush()?;

        tracing::info!(
            object = object_key,
            dest = %dest.display(),
            bytes = total,
            chunks,
            elapsed_ms = timer.elapsed_ms(),
            "Artifact stored locally"
        );
        Ok(self.public_url(object_key))
    }

    fn name(&self) -> &str {
        "local"
    }
}
