//! Sequential per-line synthesis with failure isolation.

use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::backend::BackendChain;
use super::request::{AudioSettings, SynthesisRequest, validate};
use super::speaker::SpeakerRoster;
use crate::audio::AudioArtifact;
use crate::script::{DialogueLine, SpeakerKey, clean_text};

/// A line that produced no audio, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedLine {
    /// Zero-based position in the parsed script.
    pub index: usize,
    pub reason: String,
}

/// Everything one dispatch pass produced.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    /// Clips in script order.
    pub artifacts: Vec<AudioArtifact>,
    pub skipped: Vec<SkippedLine>,
    /// Repairs applied by validation, prefixed with the line number.
    pub warnings: Vec<String>,
}

/// Turns dialogue lines into temporary audio clips, one backend call at a time.
pub struct Dispatcher<'a> {
    chain: &'a BackendChain,
    roster: &'a SpeakerRoster,
    audio: AudioSettings,
    style_a: Option<i64>,
    style_b: Option<i64>,
    temp_dir: PathBuf,
}

impl<'a> Dispatcher<'a> {
    pub fn new(chain: &'a BackendChain, roster: &'a SpeakerRoster, audio: AudioSettings, temp_dir: PathBuf) -> Self {
        Self { chain, roster, audio, style_a: None, style_b: None, temp_dir }
    }

    /// Request specific styles instead of each speaker's first one.
    pub fn with_styles(mut self, style_a: Option<i64>, style_b: Option<i64>) -> Self {
        self.style_a = style_a;
        self.style_b = style_b;
        self
    }

    fn style_override(&self, key: SpeakerKey) -> Option<i64> {
        match key {
            SpeakerKey::A => self.style_a,
            SpeakerKey::B => self.style_b,
        }
    }

    /// Build the draft request for a line, or `None` if its speaker is not in the roster.
    fn draft(&self, line: &DialogueLine) -> Option<SynthesisRequest> {
        let speaker = self.roster.resolve(line.speaker)?.clone();
        let style_id = self.style_override(line.speaker).or_else(|| speaker.styles.first().map(|s| s.id)).unwrap_or(0);

        Some(SynthesisRequest { text: clean_text(&line.text), speaker_key: line.speaker, speaker, style_id, speed: line.speed, pitch: line.pitch, audio: self.audio })
    }

    /// Synthesize every line in order. A failing line is recorded and skipped.
    pub async fn dispatch(&self, lines: &[DialogueLine]) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        let total = lines.len();

        for (index, line) in lines.iter().enumerate() {
            let number = index + 1;

            let Some(draft) = self.draft(line) else {
                warn!("Line {}/{}: speaker {} (index {}) is not available ({} speaker(s)), skipping", number, total, line.speaker, line.speaker.index(), self.roster.len());
                outcome.skipped.push(SkippedLine { index, reason: format!("speaker {} not available", line.speaker) });
                continue;
            };

            let validated = validate(draft);
            for issue in validated.warnings() {
                warn!("Line {}: {}", number, issue);
                outcome.warnings.push(format!("line {}: {}", number, issue));
            }
            if validated.is_fatal() {
                let reason = validated.errors().map(|e| e.to_string()).collect::<Vec<_>>().join("; ");
                warn!("Line {}/{}: invalid request ({}), skipping", number, total, reason);
                outcome.skipped.push(SkippedLine { index, reason });
                continue;
            }

            let request = validated.request;
            info!("🗣️  Line {}/{} [{}] {} ({}, speed {:.2}, pitch {:.2})", number, total, line.speaker, request.speaker.display_name, request.style_name(), request.speed, request.pitch);
            debug!("Text: \"{}\"", request.text);

            let audio = match self.chain.synthesize(&request).await {
                Ok(audio) => audio,
                Err(e) => {
                    error!("❌ Line {}/{} failed for speaker {} style {}: {}", number, total, request.speaker.id, request.style_id, e);
                    outcome.skipped.push(SkippedLine { index, reason: e.to_string() });
                    continue;
                }
            };

            match AudioArtifact::persist(&self.temp_dir, index, self.audio.extension(), &audio) {
                Ok(artifact) => outcome.artifacts.push(artifact),
                Err(e) => {
                    error!("❌ Line {}/{}: failed to store audio: {:#}", number, total, e);
                    outcome.skipped.push(SkippedLine { index, reason: format!("{:#}", e) });
                }
            }
        }

        info!("Synthesized {}/{} line(s)", outcome.artifacts.len(), total);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::script::parse_script;
    use crate::tts::backend::SpeechBackend;
    use crate::tts::backend::mock::MockBackend;
    use crate::tts::speaker::{SpeakerProfile, SpeakerStyle};

    fn chain(backend: MockBackend) -> (Arc<MockBackend>, BackendChain) {
        let backend = Arc::new(backend);
        let chain = BackendChain::new(vec![backend.clone() as Arc<dyn SpeechBackend>], Duration::from_secs(1));
        (backend, chain)
    }

    fn roster() -> SpeakerRoster {
        SpeakerRoster::new(vec![SpeakerProfile::for_voice(SpeakerKey::A, "a"), SpeakerProfile::for_voice(SpeakerKey::B, "b")])
    }

    #[tokio::test]
    async fn test_failing_line_is_isolated() {
        let mut backend = MockBackend::new("mock");
        backend.fail_marker = Some("二番".to_string());
        let (_, chain) = chain(backend);
        let roster = roster();
        let dir = tempfile::tempdir().unwrap();

        let lines = parse_script("[男性]\n一番\n[女性]\n二番\n[男性]\n三番\n[女性]\n四番\n");
        let dispatcher = Dispatcher::new(&chain, &roster, AudioSettings::default(), dir.path().to_path_buf());
        let outcome = dispatcher.dispatch(&lines).await;

        assert_eq!(outcome.artifacts.len(), 3);
        let bodies: Vec<String> = outcome.artifacts.iter().map(|a| std::fs::read_to_string(a.path()).unwrap()).collect();
        assert_eq!(bodies, vec!["一番", "三番", "四番"]);
        assert_eq!(outcome.artifacts.iter().map(|a| a.line_index).collect::<Vec<_>>(), vec![0, 2, 3]);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].index, 1);
    }

    #[tokio::test]
    async fn test_missing_speaker_is_skipped_without_backend_call() {
        let (backend, chain) = chain(MockBackend::new("mock"));
        let roster = SpeakerRoster::new(vec![SpeakerProfile::for_voice(SpeakerKey::A, "a")]);
        let dir = tempfile::tempdir().unwrap();

        let lines = parse_script("[男性]\nはい\n[女性]\nいいえ\n");
        let outcome = Dispatcher::new(&chain, &roster, AudioSettings::default(), dir.path().to_path_buf()).dispatch(&lines).await;

        assert_eq!(outcome.artifacts.len(), 1);
        assert_eq!(outcome.skipped[0].index, 1);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_label_only_line_is_skipped_before_backend() {
        let (backend, chain) = chain(MockBackend::new("mock"));
        let roster = roster();
        let dir = tempfile::tempdir().unwrap();

        let lines = parse_script("[男性]\nセリフ:\n[女性]\nはい\n");
        assert_eq!(lines.len(), 2);
        let outcome = Dispatcher::new(&chain, &roster, AudioSettings::default(), dir.path().to_path_buf()).dispatch(&lines).await;

        assert_eq!(outcome.artifacts.len(), 1);
        assert_eq!(outcome.artifacts[0].line_index, 1);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].index, 0);
        assert!(outcome.skipped[0].reason.contains("text"));
        assert_eq!(backend.calls(), 1);
        assert_eq!(backend.seen.lock().as_slice(), ["はい"]);
    }

    #[tokio::test]
    async fn test_labels_are_stripped_and_values_repaired() {
        let (backend, chain) = chain(MockBackend::new("mock"));
        let roster = roster();
        let dir = tempfile::tempdir().unwrap();

        let lines = parse_script("[男性]\n速度: 3.0\nセリフ: こんにちは\n");
        let outcome = Dispatcher::new(&chain, &roster, AudioSettings::default(), dir.path().to_path_buf()).dispatch(&lines).await;

        assert_eq!(backend.seen.lock().as_slice(), ["こんにちは"]);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].starts_with("line 1: speed"));
    }

    #[tokio::test]
    async fn test_style_override_and_default() {
        let mut backend = MockBackend::new("mock");
        backend.render = |request| request.style_id.to_string().into_bytes();
        let (_, chain) = chain(backend);
        let styles = vec![SpeakerStyle { id: 7, name: "のーまる".into() }, SpeakerStyle { id: 9, name: "ささやき".into() }];
        let roster = SpeakerRoster::new(vec![
            SpeakerProfile { id: "a".into(), display_name: "男性".into(), styles: styles.clone() },
            SpeakerProfile { id: "b".into(), display_name: "女性".into(), styles },
        ]);
        let dir = tempfile::tempdir().unwrap();

        let lines = parse_script("[男性]\nあ\n[女性]\nい\n");
        let outcome = Dispatcher::new(&chain, &roster, AudioSettings::default(), dir.path().to_path_buf()).with_styles(None, Some(9)).dispatch(&lines).await;

        let styles: Vec<String> = outcome.artifacts.iter().map(|a| std::fs::read_to_string(a.path()).unwrap()).collect();
        assert_eq!(styles, vec!["7", "9"]);
    }
}
