//! Local synthesis engine reached over HTTP (COEIROINK-compatible API).
//!
//! - `GET  {base}/v1/speakers`  lists speakers and their styles
//! - `POST {base}/v1/synthesis` returns WAV audio for one request

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::backend::{BackendError, BackendResult, SpeechBackend};
use super::request::SynthesisRequest;
use super::speaker::{SpeakerProfile, SpeakerStyle};

/// Speaker entry as returned by `/v1/speakers`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EngineSpeaker {
    speaker_uuid: String,
    #[serde(default)]
    speaker_name: Option<String>,
    #[serde(default)]
    styles: Vec<EngineStyle>,
}

/// Style ids come back as numbers or numeric strings depending on the engine build.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EngineStyle {
    #[serde(default)]
    style_id: Value,
    #[serde(default)]
    style_name: Option<String>,
}

/// Body of `/v1/synthesis`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesisBody<'a> {
    text: &'a str,
    speaker_uuid: &'a str,
    style_id: i64,
    speed_scale: f32,
    pitch_scale: f32,
    intonation_scale: f32,
    volume_scale: f32,
    pre_phoneme_length: f32,
    post_phoneme_length: f32,
    output_sampling_rate: u32,
}

impl<'a> SynthesisBody<'a> {
    fn from_request(request: &'a SynthesisRequest) -> Self {
        Self {
            text: &request.text,
            speaker_uuid: &request.speaker.id,
            style_id: request.style_id,
            speed_scale: request.speed,
            pitch_scale: request.pitch,
            intonation_scale: request.audio.intonation,
            volume_scale: request.audio.volume,
            pre_phoneme_length: request.audio.pre_phoneme_length,
            post_phoneme_length: request.audio.post_phoneme_length,
            output_sampling_rate: request.audio.sample_rate,
        }
    }
}

/// HTTP client for a locally hosted synthesis engine.
pub struct EngineBackend {
    client: reqwest::Client,
    base_url: String,
    probe_timeout: Duration,
}

impl EngineBackend {
    /// Create a client for the engine at `base_url`.
    pub fn new(base_url: &str, probe_timeout: Duration) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.trim_end_matches('/').to_string(), probe_timeout }
    }

    fn speakers_url(&self) -> String {
        format!("{}/v1/speakers", self.base_url)
    }

    async fn fetch_speakers(&self) -> BackendResult<Vec<EngineSpeaker>> {
        let response = self.client.get(self.speakers_url()).timeout(self.probe_timeout).send().await.map_err(|e| BackendError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(BackendError::Status { status: status.as_u16(), detail });
        }

        response.json::<Vec<EngineSpeaker>>().await.map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }
}

/// Coerce an engine style id into an integer, defaulting to 0.
fn style_id(value: &Value, speaker: &str) -> i64 {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)).unwrap_or_else(|| {
            warn!("Speaker {} has non-integer style id {}, using 0", speaker, n);
            0
        }),
        Value::String(s) => s.trim().parse().unwrap_or_else(|_| {
            warn!("Speaker {} has invalid style id '{}', using 0", speaker, s);
            0
        }),
        _ => 0,
    }
}

#[async_trait]
impl SpeechBackend for EngineBackend {
    fn name(&self) -> &str {
        "engine"
    }

    async fn probe(&self) -> BackendResult<()> {
        let speakers = self.fetch_speakers().await?;
        debug!("Engine at {} is up with {} speaker(s)", self.base_url, speakers.len());
        Ok(())
    }

    async fn speakers(&self) -> BackendResult<Vec<SpeakerProfile>> {
        let speakers = self.fetch_speakers().await?;

        let profiles: Vec<SpeakerProfile> = speakers
            .into_iter()
            .map(|speaker| {
                let label = speaker.speaker_name.as_deref().unwrap_or(&speaker.speaker_uuid).to_string();
                let styles = speaker
                    .styles
                    .iter()
                    .map(|style| SpeakerStyle { id: style_id(&style.style_id, &label), name: style.style_name.clone().unwrap_or_else(|| "不明".to_string()) })
                    .collect();
                SpeakerProfile::from_engine(&speaker.speaker_uuid, styles)
            })
            .collect();

        for profile in &profiles {
            info!("Speaker: {} ({}) styles: {:?}", profile.display_name, profile.id, profile.style_ids());
        }

        Ok(profiles)
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> BackendResult<Vec<u8>> {
        let body = SynthesisBody::from_request(request);

        let response = self
            .client
            .post(format!("{}/v1/synthesis", self.base_url))
            .header("Accept", "audio/wav")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        debug!("Engine responded with status {}", status);
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(BackendError::Status { status: status.as_u16(), detail });
        }

        Ok(response.bytes().await?.to_vec())
    }
}
