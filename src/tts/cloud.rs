//! Google Cloud Text-to-Speech backend (REST, API-key authentication).

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::backend::{BackendError, BackendResult, SpeechBackend};
use super::request::SynthesisRequest;
use super::speaker::SpeakerProfile;
use crate::script::SpeakerKey;

/// Public endpoint of the Cloud Text-to-Speech API.
pub const GOOGLE_TTS_URL: &str = "https://texttospeech.googleapis.com";

/// Semitones per unit of engine pitch; -0.5..0.5 becomes -10..10 semitones.
const PITCH_SEMITONES: f32 = 20.0;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: String,
}

/// Cloud voices per script speaker.
#[derive(Debug, Clone)]
pub struct CloudVoices {
    pub language_code: String,
    pub speaker_a: String,
    pub speaker_b: String,
}

impl CloudVoices {
    fn voice_for(&self, key: SpeakerKey) -> &str {
        match key {
            SpeakerKey::A => &self.speaker_a,
            SpeakerKey::B => &self.speaker_b,
        }
    }
}

/// Client for the Cloud Text-to-Speech REST API.
pub struct CloudBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    voices: CloudVoices,
    probe_timeout: Duration,
}

impl CloudBackend {
    pub fn new(base_url: &str, api_key: &str, voices: CloudVoices, probe_timeout: Duration) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.trim_end_matches('/').to_string(), api_key: api_key.to_string(), voices, probe_timeout }
    }

    fn key_param(&self) -> String {
        urlencoding::encode(&self.api_key).into_owned()
    }
}

#[async_trait]
impl SpeechBackend for CloudBackend {
    fn name(&self) -> &str {
        "cloud"
    }

    async fn probe(&self) -> BackendResult<()> {
        let url = format!("{}/v1/voices?languageCode={}&key={}", self.base_url, urlencoding::encode(&self.voices.language_code), self.key_param());
        let response = self.client.get(url).timeout(self.probe_timeout).send().await.map_err(|e| BackendError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(BackendError::Status { status: status.as_u16(), detail });
        }
        Ok(())
    }

    async fn speakers(&self) -> BackendResult<Vec<SpeakerProfile>> {
        Ok(vec![SpeakerProfile::for_voice(SpeakerKey::A, &self.voices.speaker_a), SpeakerProfile::for_voice(SpeakerKey::B, &self.voices.speaker_b)])
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> BackendResult<Vec<u8>> {
        let voice = self.voices.voice_for(request.speaker_key);
        debug!("Cloud synthesis with voice {}", voice);

        let body = json!({
            "input": { "text": request.text },
            "voice": { "languageCode": self.voices.language_code, "name": voice },
            "audioConfig": {
                "audioEncoding": "LINEAR16",
                "speakingRate": request.speed,
                "pitch": request.pitch * PITCH_SEMITONES,
                "sampleRateHertz": request.audio.sample_rate,
            }
        });

        let response = self.client.post(format!("{}/v1/text:synthesize?key={}", self.base_url, self.key_param())).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(BackendError::Status { status: status.as_u16(), detail });
        }

        let payload: SynthesizeResponse = response.json().await.map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        STANDARD.decode(payload.audio_content).map_err(|e| BackendError::InvalidResponse(format!("audioContent is not base64: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::tts::request::AudioSettings;

    fn voices() -> CloudVoices {
        CloudVoices { language_code: "ja-JP".to_string(), speaker_a: "ja-JP-Wavenet-C".to_string(), speaker_b: "ja-JP-Wavenet-A".to_string() }
    }

    #[tokio::test]
    async fn test_synthesize_decodes_audio_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/text:synthesize"))
            .and(query_param("key", "secret"))
            .and(body_partial_json(json!({ "voice": { "name": "ja-JP-Wavenet-A" }, "audioConfig": { "audioEncoding": "LINEAR16", "pitch": 5.0 } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "audioContent": STANDARD.encode(b"wav-bytes") })))
            .mount(&server)
            .await;

        let backend = CloudBackend::new(&server.uri(), "secret", voices(), Duration::from_secs(2));
        let request = SynthesisRequest {
            text: "元気です".to_string(),
            speaker_key: SpeakerKey::B,
            speaker: SpeakerProfile::for_voice(SpeakerKey::B, "unrelated-engine-uuid"),
            style_id: 0,
            speed: 1.0,
            pitch: 0.25,
            audio: AudioSettings::default(),
        };

        assert_eq!(backend.synthesize(&request).await.unwrap(), b"wav-bytes");
    }

    #[tokio::test]
    async fn test_probe_rejects_bad_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).and(path("/v1/voices")).respond_with(ResponseTemplate::new(403).set_body_string("API key not valid")).mount(&server).await;

        let backend = CloudBackend::new(&server.uri(), "bad", voices(), Duration::from_secs(2));
        assert!(matches!(backend.probe().await, Err(BackendError::Status { status: 403, .. })));
    }

    #[tokio::test]
    async fn test_fixed_two_speaker_roster() {
        let backend = CloudBackend::new(GOOGLE_TTS_URL, "k", voices(), Duration::from_secs(2));
        let speakers = backend.speakers().await.unwrap();
        assert_eq!(speakers[0].id, "ja-JP-Wavenet-C");
        assert_eq!(speakers[0].display_name, "男性");
        assert_eq!(speakers[1].display_name, "女性");
    }
}
