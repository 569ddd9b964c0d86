//! Runs `TusArtifactStore` against a minimal in-process tus server.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{patch, post};
use axum::Router;
use parking_lot::Mutex;

use framecast_common::config::DEFAULT_CHUNK_SIZE;
use framecast_publisher::{ArtifactStore, TusArtifactStore};

const UPLOAD_PATH: &str = "/storage/v1/upload/resumable/upload-1";

#[derive(Default)]
struct TusState {
    upload_length: Option<u64>,
    metadata: Option<String>,
    authorization: Option<String>,
    received: Vec<u8>,
    chunk_sizes: Vec<usize>,
    /// Added to every echoed offset.
    offset_skew: u64,
}

type Shared = Arc<Mutex<TusState>>;

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

async fn create(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let mut state = state.lock();
    state.upload_length = header_str(&headers, "upload-length").and_then(|v| v.parse().ok());
    state.metadata = header_str(&headers, "upload-metadata");
    state.authorization = header_str(&headers, "authorization");
    (StatusCode::CREATED, [(header::LOCATION, UPLOAD_PATH)]).into_response()
}

async fn append(State(state): State<Shared>, headers: HeaderMap, body: Bytes) -> Response {
    let mut state = state.lock();
    let offset: Option<u64> = header_str(&headers, "upload-offset").and_then(|v| v.parse().ok());
    if offset != Some(state.received.len() as u64) {
        return StatusCode::CONFLICT.into_response();
    }
    state.chunk_sizes.push(body.len());
    state.received.extend_from_slice(&body);
    let echoed = state.received.len() as u64 + state.offset_skew;
    (StatusCode::NO_CONTENT, [("upload-offset", echoed.to_string())]).into_response()
}

/// Serve on an ephemeral port from a dedicated runtime thread.
fn spawn_server(offset_skew: u64) -> (String, Shared) {
    let state: Shared = Arc::new(Mutex::new(TusState {
        offset_skew,
        ..TusState::default()
    }));
    let app = Router::new()
        .route("/storage/v1/upload/resumable", post(create))
        .route(UPLOAD_PATH, patch(append))
        .layer(DefaultBodyLimit::disable())
        .with_state(Arc::clone(&state));

    let (tx, rx) = std::sync::mpsc::channel::<SocketAddr>();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(listener.local_addr().unwrap()).unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });
    let addr = rx.recv().unwrap();
    (format!("http://{addr}"), state)
}

fn artifact(name: &str, len: usize) -> (PathBuf, Vec<u8>) {
    let path = std::env::temp_dir().join(format!("framecast_tus_{name}.mp4"));
    let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    std::fs::write(&path, &data).unwrap();
    (path, data)
}

#[test]
fn uploads_in_fixed_size_chunks() {
    for (name, len, chunks) in [
        ("exact", DEFAULT_CHUNK_SIZE * 2, 2),
        ("spill", DEFAULT_CHUNK_SIZE * 2 + 1, 3),
    ] {
        let (endpoint, state) = spawn_server(0);
        let (path, data) = artifact(name, len);
        let store = TusArtifactStore::new(&endpoint, "videos", "secret");

        let url = store.upload(&path, "u1/videos/video_s1.mp4").unwrap();
        assert_eq!(
            url,
            format!("{endpoint}/storage/v1/object/public/videos/u1/videos/video_s1.mp4")
        );

        let state = state.lock();
        assert_eq!(state.upload_length, Some(len as u64));
        assert_eq!(state.authorization.as_deref(), Some("Bearer secret"));
        assert_eq!(
            state.metadata.as_deref(),
            Some(store.upload_metadata("u1/videos/video_s1.mp4").as_str())
        );
        assert_eq!(state.chunk_sizes.len(), chunks, "{name}");
        assert!(state.chunk_sizes.iter().all(|&n| n <= DEFAULT_CHUNK_SIZE));
        assert!(state.received == data, "{name}: uploaded bytes differ");

        std::fs::remove_file(&path).ok();
    }
}

#[test]
fn wrong_acknowledged_offset_aborts_upload() {
    let (endpoint, state) = spawn_server(1);
    let (path, _) = artifact("skew", 4096);
    let store = TusArtifactStore::new(&endpoint, "videos", "secret").with_chunk_size(1024);

    let err = store.upload(&path, "u1/videos/video_s1.mp4").unwrap_err();
    assert!(err.to_string().contains("acknowledged offset 1025, expected 1024"), "{err}");
    assert_eq!(state.lock().chunk_sizes, vec![1024]);

    std::fs::remove_file(&path).ok();
}

#[test]
fn missing_file_is_reported_before_any_request() {
    let (endpoint, state) = spawn_server(0);
    let store = TusArtifactStore::new(&endpoint, "videos", "secret");

    let err = store
        .upload(&std::env::temp_dir().join("framecast_tus_missing.mp4"), "k")
        .unwrap_err();
    assert!(err.to_string().starts_with("File not found"), "{err}");
    assert!(state.lock().upload_length.is_none());
}
