//! HTTP trigger surface: list lines, run the pipeline, fetch results.

mod handlers;

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::info;

use crate::pipeline::Pipeline;

/// Shared state behind every route.
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    /// Serializes pipeline runs.
    pub run_guard: Mutex<()>,
    pub script_path: PathBuf,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>, script_path: PathBuf) -> Self {
        Self { pipeline, run_guard: Mutex::new(()), script_path }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/lines", get(handlers::list_lines))
        .route("/api/synthesize", post(handlers::synthesize))
        .route("/api/speakers", get(handlers::list_speakers))
        .route("/audio/{filename}", get(handlers::download_audio))
        .with_state(state)
}

/// Serve until `shutdown` resolves.
///
/// # Errors
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(state: Arc<AppState>, listen: &str, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
    let listener = TcpListener::bind(listen).await.with_context(|| format!("Failed to bind {}", listen))?;
    info!("🌐 Listening on http://{}", listener.local_addr().context("Failed to read local address")?);

    axum::serve(listener, router(state)).with_graceful_shutdown(shutdown).await.context("HTTP server error")?;

    info!("✅ Server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::audio::wav::testing::tone_wav;
    use crate::pipeline::PipelineSettings;
    use crate::tts::mock::MockBackend;
    use crate::tts::{AudioSettings, BackendChain, SpeechBackend};

    struct Harness {
        state: Arc<AppState>,
        dir: tempfile::TempDir,
    }

    async fn harness(script: Option<&str>, backend: MockBackend) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let script_path = dir.path().join("text.txt");
        if let Some(script) = script {
            std::fs::write(&script_path, script).unwrap();
        }

        let mut chain = BackendChain::new(vec![Arc::new(backend) as Arc<dyn SpeechBackend>], Duration::from_secs(1));
        let roster = chain.initialize().await.unwrap();
        let settings = PipelineSettings { output_dir: dir.path().join("audio_output"), temp_dir: dir.path().join("tmp"), audio: AudioSettings::default(), style_a: None, style_b: None };
        let pipeline = Arc::new(Pipeline::new(chain, roster, settings));
        Harness { state: Arc::new(AppState::new(pipeline, script_path)), dir }
    }

    fn wav_backend() -> MockBackend {
        let mut backend = MockBackend::new("mock");
        backend.render = |_| tone_wav(100, 16000);
        backend
    }

    async fn send(state: &Arc<AppState>, method: &str, uri: &str) -> (StatusCode, Vec<u8>) {
        let request = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
        let response = router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    fn json(body: &[u8]) -> serde_json::Value {
        serde_json::from_slice(body).unwrap()
    }

    #[tokio::test]
    async fn test_lines_endpoint() {
        let h = harness(Some("[男性]\n速度: 1.2\nこんにちは\n[女性]\n元気です\n"), wav_backend()).await;

        let (status, body) = send(&h.state, "GET", "/api/lines").await;
        assert_eq!(status, StatusCode::OK);
        let body = json(&body);
        assert_eq!(body["lines"].as_array().unwrap().len(), 2);
        assert_eq!(body["lines"][0]["speaker_label"], "男性");
        assert_eq!(body["lines"][1]["text"], "元気です");
    }

    #[tokio::test]
    async fn test_missing_script_is_404() {
        let h = harness(None, wav_backend()).await;

        let (status, body) = send(&h.state, "GET", "/api/lines").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json(&body)["kind"], "script_not_found");
    }

    #[tokio::test]
    async fn test_synthesize_then_download() {
        let h = harness(Some("[男性]\nこんにちは\n[女性]\n元気です\n"), wav_backend()).await;

        let (status, body) = send(&h.state, "POST", "/api/synthesize").await;
        assert_eq!(status, StatusCode::OK);
        let body = json(&body);
        assert_eq!(body["success"], true);
        assert_eq!(body["lines_synthesized"], 2);
        let file_name = body["file_name"].as_str().unwrap().to_string();
        assert!(h.dir.path().join("audio_output").join(&file_name).exists());

        let (status, audio) = send(&h.state, "GET", &format!("/audio/{}", file_name)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&audio[..4], b"RIFF");
    }

    #[tokio::test]
    async fn test_empty_script_is_400() {
        let h = harness(Some("\n\n"), wav_backend()).await;

        let (status, body) = send(&h.state, "POST", "/api/synthesize").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json(&body)["kind"], "no_dialogue");
    }

    #[tokio::test]
    async fn test_all_lines_failing_is_502() {
        let mut backend = wav_backend();
        backend.fail_marker = Some(String::new());
        let h = harness(Some("[男性]\nこんにちは\n"), backend).await;

        let (status, body) = send(&h.state, "POST", "/api/synthesize").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(json(&body)["kind"], "no_audio_generated");
    }

    #[tokio::test]
    async fn test_download_rejects_traversal_and_missing() {
        let h = harness(Some("[男性]\nはい\n"), wav_backend()).await;

        let (status, _) = send(&h.state, "GET", "/audio/..secret.wav").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&h.state, "GET", "/audio/missing.wav").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json(&body)["kind"], "not_found");
    }

    #[tokio::test]
    async fn test_speakers_endpoint() {
        let h = harness(Some(""), wav_backend()).await;

        let (status, body) = send(&h.state, "GET", "/api/speakers").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body)["speakers"].as_array().unwrap().len(), 2);
    }
}
