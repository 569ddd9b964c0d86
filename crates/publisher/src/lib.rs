//! Framecast Publisher
//!
//! Hands finished videos to object storage and records the resulting
//! [`RenderResult`](framecast_job_model::result::RenderResult) rows.
//!
//! All I/O here is blocking. Call it from a blocking context.

pub mod sink;
pub mod store;
pub mod tus;

use std::sync::Arc;

use framecast_common::config::{
    PersistenceBackend, PersistenceConfig, StorageBackend, StorageConfig,
};
use framecast_common::error::FramecastResult;

pub use sink::{JsonlResultSink, RestResultSink, ResultSink};
pub use store::{object_key, ArtifactStore, LocalArtifactStore};
pub use tus::TusArtifactStore;

/// Build the artifact store selected by `storage.backend`.
pub fn artifact_store(config: &StorageConfig) -> FramecastResult<Arc<dyn ArtifactStore>> {
    Ok(match config.backend {
        StorageBackend::Local => Arc::new(
            LocalArtifactStore::new(&config.local_dir, &config.public_base_url)
                .with_chunk_size(config.chunk_size),
        ),
        StorageBackend::Tus => Arc::new(TusArtifactStore::from_config(config)?),
    })
}

/// Build the result sink selected by `persistence.backend`.
pub fn result_sink(config: &PersistenceConfig) -> FramecastResult<Arc<dyn ResultSink>> {
    Ok(match config.backend {
        PersistenceBackend::Jsonl => Arc::new(JsonlResultSink::new(&config.jsonl_path)),
        PersistenceBackend::Rest => Arc::new(RestResultSink::from_config(config)?),
    })
}
