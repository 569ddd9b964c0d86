//! Resumable (tus 1.0.0) uploads to Supabase-style object storage.
//!
//! One upload is created per artifact, then the file is sent as a sequence
//! of `PATCH` requests. The server echoes the new offset after each chunk
//! and a mismatch aborts the upload. Interrupted uploads are not resumed.

use std::fs::File;
use std::path::Path;
use std::sync::OnceLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::blocking::{Client, Response};
use reqwest::header::LOCATION;

use framecast_common::config::{DEFAULT_CHUNK_SIZE, StorageConfig};
use framecast_common::error::{FramecastError, FramecastResult};
use framecast_common::timing::StageTimer;

use crate::store::{ArtifactStore, read_chunk};

const TUS_VERSION: &str = "1.0.0";
const CONTENT_TYPE: &str = "video/mp4";
const CACHE_CONTROL: &str = "3600";

pub struct TusArtifactStore {
    endpoint: String,
    bucket: String,
    api_key: String,
    chunk_size: usize,
    client: OnceLock<Client>,
}

impl TusArtifactStore {
    pub fn new(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            api_key: api_key.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            client: OnceLock::new(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> FramecastResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| FramecastError::config("storage.api_key is required for tus uploads"))?;
        Ok(Self::new(&config.endpoint, &config.bucket, api_key).with_chunk_size(config.chunk_size))
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn upload_url(&self) -> String {
        format!("{}/storage/v1/upload/resumable", self.endpoint)
    }

    pub fn public_url(&self, object_key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.endpoint, self.bucket, object_key
        )
    }

    /// `Upload-Metadata` header value: comma-separated `key base64(value)`.
    pub fn upload_metadata(&self, object_key: &str) -> String {
        [
            ("bucketName", self.bucket.as_str()),
            ("objectName", object_key),
            ("contentType", CONTENT_TYPE),
            ("cacheControl", CACHE_CONTROL),
        ]
        .iter()
        .map(|(key, value)| format!("{key} {}", BASE64.encode(value)))
        .collect::<Vec<_>>()
        .join(",")
    }

    /// Absolute URL for a `Location` header, which may be path-only.
    fn resolve_location(&self, location: &str) -> String {
        if location.starts_with("http://") || location.starts_with("https://") {
            location.to_string()
        } else {
            format!("{}/{}", self.endpoint, location.trim_start_matches('/'))
        }
    }

    fn client(&self) -> FramecastResult<&Client> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = Client::builder()
            .build()
            .map_err(|e| FramecastError::http(format!("Failed to build HTTP client: {e}")))?;
        Ok(self.client.get_or_init(|| client))
    }

    fn create(&self, object_key: &str, length: u64) -> FramecastResult<String> {
        let response = self
            .client()?
            .post(self.upload_url())
            .bearer_auth(&self.api_key)
            .header("Tus-Resumable", TUS_VERSION)
            .header("Upload-Length", length.to_string())
            .header("Upload-Metadata", self.upload_metadata(object_key))
            .header("x-upsert", "true")
            .send()
            .map_err(|e| FramecastError::publish(format!("create upload: {e}")))?;
        let response = check_status(response, "create upload")?;

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| FramecastError::publish("create upload: response has no Location"))?;
        Ok(self.resolve_location(location))
    }

    fn patch(&self, location: &str, offset: u64, chunk: &[u8]) -> FramecastResult<u64> {
        let response = self
            .client()?
            .patch(location)
            .bearer_auth(&self.api_key)
            .header("Tus-Resumable", TUS_VERSION)
            .header("Upload-Offset", offset.to_string())
            .header("Content-Type", "application/offset+octet-stream")
            .body(chunk.to_vec())
            .send()
            .map_err(|e| FramecastError::publish(format!("patch at {offset}: {e}")))?;
        let response = check_status(response, "patch")?;

        response
            .headers()
            .get("Upload-Offset")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok())
            .ok_or_else(|| FramecastError::publish("patch: response has no Upload-Offset"))
    }
}

impl ArtifactStore for TusArtifactStore {
    fn upload(&self, path: &Path, object_key: &str) -> FramecastResult<String> {
        let timer = StageTimer::start();
        let mut file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FramecastError::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => e.into(),
        })?;
        let length = file.metadata()?.len();

        let location = self.create(object_key, length)?;
        tracing::debug!(object = object_key, location = %location, length, "Upload created");

        let mut buf = vec![0u8; self.chunk_size];
        let mut offset = 0u64;
        while offset < length {
            let n = read_chunk(&mut file, &mut buf)?;
            if n == 0 {
                return Err(FramecastError::publish(format!(
                    "{} ended at {offset} of {length} bytes",
                    path.display()
                )));
            }
            let expected = offset + n as u64;
            let acknowledged = self.patch(&location, offset, &buf[..n])?;
            if acknowledged != expected {
                return Err(FramecastError::publish(format!(
                    "server acknowledged offset {acknowledged}, expected {expected}"
                )));
            }
            offset = acknowledged;
        }

        tracing::info!(
            object = object_key,
            bytes = length,
            elapsed_ms = timer.elapsed_ms(),
            "Artifact uploaded"
        );
        Ok(self.public_url(object_key))
    }

    fn name(&self) -> &str {
        "tus"
    }
}

impl std::fmt::Debug for TusArtifactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TusArtifactStore")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("chunk_size", &self.chunk_size)
            .finish_non_exhaustive()
    }
}

fn check_status(response: Response, what: &str) -> FramecastResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(FramecastError::publish(format!("{what}: HTTP {status}: {body}")))
}
