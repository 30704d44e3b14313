//! Offline synthesis backend using Kokoro models through sherpa-rs.
//!
//! The model itself is only compiled in with the `kokoro` feature; the voice
//! mapping below is always available so configuration can be validated
//! without the native libraries.

use crate::config::get_voice;
use crate::script::SpeakerKey;

/// Kokoro output sample rate.
pub const KOKORO_SAMPLE_RATE: u32 = 24000;

/// Kokoro voice names used for the two script speakers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KokoroVoices {
    pub speaker_a: String,
    pub speaker_b: String,
}

impl KokoroVoices {
    pub fn voice_for(&self, key: SpeakerKey) -> &str {
        match key {
            SpeakerKey::A => &self.speaker_a,
            SpeakerKey::B => &self.speaker_b,
        }
    }

    /// Model speaker id for a script speaker.
    pub fn speaker_id(&self, key: SpeakerKey) -> Option<i32> {
        get_voice(self.voice_for(key)).map(|v| v.speaker_id)
    }
}

#[cfg(feature = "kokoro")]
pub use model::KokoroBackend;

#[cfg(feature = "kokoro")]
mod model {
    use std::sync::Arc;

    use anyhow::Result;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use sherpa_rs::OnnxConfig;
    use sherpa_rs::tts::{CommonTtsConfig, KokoroTts, KokoroTtsConfig};
    use tracing::{debug, info};

    use super::{KOKORO_SAMPLE_RATE, KokoroVoices};
    use crate::audio::wav::encode_mono_i16;
    use crate::config::AppConfig;
    use crate::script::SpeakerKey;
    use crate::tts::backend::{BackendError, BackendResult, SpeechBackend};
    use crate::tts::request::SynthesisRequest;
    use crate::tts::speaker::SpeakerProfile;

    /// Kokoro model wrapped as a synthesis backend.
    pub struct KokoroBackend {
        tts: Arc<Mutex<KokoroTts>>,
        voices: KokoroVoices,
    }

    impl KokoroBackend {
        /// Load the Kokoro model described by `config`.
        ///
        /// # Errors
        /// Returns an error if the model files are missing.
        pub fn new(config: &AppConfig) -> Result<Self> {
            let model = config.tts_model_path();
            if !model.exists() {
                anyhow::bail!("Kokoro model not found: {}", model.display());
            }

            let provider = config.effective_tts_provider();
            let voices = KokoroVoices { speaker_a: config.kokoro_voice_a.clone(), speaker_b: config.kokoro_voice_b.clone() };
            info!("Loading Kokoro model with {} provider (voices {} / {})", provider, voices.speaker_a, voices.speaker_b);

            let tts_config = KokoroTtsConfig {
                model: model.to_string_lossy().to_string(),
                voices: config.tts_voices_path().to_string_lossy().to_string(),
                tokens: config.tts_tokens_path().to_string_lossy().to_string(),
                data_dir: config.tts_data_dir().to_string_lossy().to_string(),
                dict_dir: config.tts_dict_dir().to_string_lossy().to_string(),
                lexicon: config.tts_lexicon(),
                lang: config.tts_language().to_string(),
                // Speed is applied per request
                length_scale: 1.0,
                onnx_config: OnnxConfig { provider: provider.as_sherpa_provider().to_string(), num_threads: config.tts_threads.try_into().unwrap_or(2), debug: config.verbose },
                common_config: CommonTtsConfig { max_num_sentences: 1, ..Default::default() }, // Kokoro only supports 1
            };

            Ok(Self { tts: Arc::new(Mutex::new(KokoroTts::new(tts_config))), voices })
        }
    }

    #[async_trait]
    impl SpeechBackend for KokoroBackend {
        fn name(&self) -> &str {
            "kokoro"
        }

        async fn probe(&self) -> BackendResult<()> {
            Ok(())
        }

        async fn speakers(&self) -> BackendResult<Vec<SpeakerProfile>> {
            Ok(vec![SpeakerProfile::for_voice(SpeakerKey::A, &self.voices.speaker_a), SpeakerProfile::for_voice(SpeakerKey::B, &self.voices.speaker_b)])
        }

        async fn synthesize(&self, request: &SynthesisRequest) -> BackendResult<Vec<u8>> {
            let sid = self
                .voices
                .speaker_id(request.speaker_key)
                .ok_or_else(|| BackendError::Engine(format!("unknown Kokoro voice '{}'", self.voices.voice_for(request.speaker_key))))?;

            let tts = self.tts.clone();
            let text = request.text.clone();
            let speed = request.speed;
            debug!("Kokoro synthesizing with speaker {} at speed {}", sid, speed);

            // Inference is CPU-bound; keep it off the async workers
            let samples = tokio::task::spawn_blocking(move || {
                let mut tts = tts.lock();
                tts.create(&text, sid, speed).map(|audio| audio.samples).map_err(|e| BackendError::Engine(format!("TTS generation failed: {}", e)))
            })
            .await
            .map_err(|e| BackendError::Engine(format!("synthesis task failed: {}", e)))??;

            info!("🎵 Generated speech ({} samples)", samples.len());
            encode_mono_i16(&samples, KOKORO_SAMPLE_RATE).map_err(|e| BackendError::Engine(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_mapping() {
        let voices = KokoroVoices { speaker_a: "jm_kumo".into(), speaker_b: "jf_alpha".into() };
        assert_eq!(voices.voice_for(SpeakerKey::B), "jf_alpha");
        assert_eq!(voices.speaker_id(SpeakerKey::A), Some(41));
        assert_eq!(voices.speaker_id(SpeakerKey::B), Some(37));

        let broken = KokoroVoices { speaker_a: "nobody".into(), speaker_b: "jf_alpha".into() };
        assert_eq!(broken.speaker_id(SpeakerKey::A), None);
    }
}
