//! Persistence of finished render results.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use parking_lot::Mutex;
use reqwest::blocking::Client;

use framecast_common::config::PersistenceConfig;
use framecast_common::error::{FramecastError, FramecastResult};
use framecast_job_model::result::RenderResult;

/// Trait for stores that record one row per finished render.
pub trait ResultSink: Send + Sync {
    fn insert(&self, result: &RenderResult) -> FramecastResult<()>;

    /// Sink name.
    fn name(&self) -> &str;
}

/// Appends results as JSON lines to a local file.
#[derive(Debug)]
pub struct JsonlResultSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlResultSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back every stored result, oldest first.
    pub fn read_all(&self) -> FramecastResult<Vec<RenderResult>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(Into::into))
            .collect()
    }
}

impl ResultSink for JsonlResultSink {
    fn insert(&self, result: &RenderResult) -> FramecastResult<()> {
        let mut line = serde_json::to_string(result)?;
        line.push('\n');

        let _guard = self.write_lock.lock();
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;

        tracing::debug!(
            path = %self.path.display(),
            user_id = %result.user_id,
            session_id = %result.session_id,
            "Result appended"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "jsonl"
    }
}

/// Inserts results into a PostgREST table.
pub struct RestResultSink {
    endpoint: String,
    table: String,
    api_key: String,
    client: OnceLock<Client>,
}

impl RestResultSink {
    pub fn new(
        endpoint: impl Into<String>,
        table: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            table: table.into(),
            api_key: api_key.into(),
            client: OnceLock::new(),
        }
    }

    pub fn from_config(config: &PersistenceConfig) -> FramecastResult<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            FramecastError::config("persistence.api_key is required for the rest backend")
        })?;
        Ok(Self::new(&config.endpoint, &config.table, api_key))
    }

    pub fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.endpoint, self.table)
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
}

impl ResultSink for RestResultSink {
    fn insert(&self, result: &RenderResult) -> FramecastResult<()> {
        let url = self.table_url();
        let response = self
            .client()?
            .post(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=minimal")
            .json(result)
            .send()
            .map_err(|e| FramecastError::persistence(format!("POST {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(FramecastError::persistence(format!(
                "POST {url}: HTTP {status}: {body}"
            )));
        }
        tracing::debug!(
            table = %self.table,
            user_id = %result.user_id,
            session_id = %result.session_id,
            "Result inserted"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "rest"
    }
}

impl std::fmt::Debug for RestResultSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestResultSink")
            .field("endpoint", &self.endpoint)
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}
