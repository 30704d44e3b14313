//! Route handlers for the HTTP trigger surface.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::AppState;
use crate::pipeline::{ErrorDescriptor, Pipeline, PipelineError};
use crate::script::{DialogueLine, SpeakerKey};
use crate::tts::SpeakerRoster;

const AUDIO_CONTENT_TYPE: &str = "audio/wav";

/// Error response carrying a status and a descriptor body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    descriptor: ErrorDescriptor,
}

impl ApiError {
    fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self { status, descriptor: ErrorDescriptor { error: message.into(), kind } }
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!("❌ Pipeline failed: {}", e);
        } else {
            warn!("Pipeline rejected request: {}", e);
        }
        Self { status, descriptor: e.descriptor() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.descriptor)).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct LineView {
    pub text: String,
    pub speaker: SpeakerKey,
    pub speaker_label: &'static str,
    pub speed: f32,
    pub pitch: f32,
}

impl From<DialogueLine> for LineView {
    fn from(line: DialogueLine) -> Self {
        Self { speaker_label: line.speaker.tag(), text: line.text, speaker: line.speaker, speed: line.speed, pitch: line.pitch }
    }
}

#[derive(Debug, Serialize)]
pub struct LinesResponse {
    pub lines: Vec<LineView>,
}

#[derive(Debug, Serialize)]
pub struct SynthesisResponse {
    pub success: bool,
    pub file_name: String,
    pub file_path: String,
    pub lines_synthesized: usize,
    pub lines_skipped: usize,
    pub warnings: Vec<String>,
}

/// `GET /api/lines`
pub async fn list_lines(State(state): State<Arc<AppState>>) -> Result<Json<LinesResponse>, ApiError> {
    let lines = Pipeline::load_script(&state.script_path).await?;
    Ok(Json(LinesResponse { lines: lines.into_iter().map(LineView::from).collect() }))
}

/// `POST /api/synthesize`
pub async fn synthesize(State(state): State<Arc<AppState>>) -> Result<Json<SynthesisResponse>, ApiError> {
    // One run at a time; the engine is single-instance
    let _guard = state.run_guard.lock().await;
    info!("🎬 Synthesis requested for {}", state.script_path.display());

    let report = state.pipeline.run_script_file(&state.script_path).await?;

    Ok(Json(SynthesisResponse {
        success: true,
        file_name: report.file_name,
        file_path: report.file_path.to_string_lossy().to_string(),
        lines_synthesized: report.lines_synthesized,
        lines_skipped: report.lines_skipped.len(),
        warnings: report.warnings,
    }))
}

/// `GET /api/speakers`
pub async fn list_speakers(State(state): State<Arc<AppState>>) -> Json<SpeakerRoster> {
    Json(state.pipeline.roster().clone())
}

fn is_valid_file_name(name: &str) -> bool {
    !name.is_empty() && !name.contains("..") && !name.contains('/') && !name.contains('\\')
}

/// `GET /audio/{filename}`
pub async fn download_audio(State(state): State<Arc<AppState>>, Path(file_name): Path<String>) -> Result<Response, ApiError> {
    if !is_valid_file_name(&file_name) {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "invalid_file_name", format!("invalid file name: {}", file_name)));
    }

    let path = state.pipeline.settings().output_dir.join(&file_name);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::new(StatusCode::NOT_FOUND, "not_found", format!("audio file not found: {}", file_name)));
        }
        Err(e) => return Err(PipelineError::Io(format!("failed to read {}: {}", path.display(), e)).into()),
    };

    debug!("Serving {} ({} bytes)", path.display(), bytes.len());
    Ok(([(header::CONTENT_TYPE, AUDIO_CONTENT_TYPE)], bytes).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_validation() {
        assert!(is_valid_file_name("voice_dialogue_20250101_120000.wav"));
        assert!(!is_valid_file_name("../secret.wav"));
        assert!(!is_valid_file_name("a/b.wav"));
        assert!(!is_valid_file_name("a\\b.wav"));
        assert!(!is_valid_file_name(""));
    }
}
