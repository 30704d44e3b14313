//! Per-line synthesis requests and the validate-and-repair step.

use serde::Serialize;

use super::speaker::{SpeakerProfile, SpeakerStyle};
use crate::script::SpeakerKey;

/// Accepted speed range for synthesis.
pub const SPEED_RANGE: (f32, f32) = (0.5, 2.0);

/// Accepted pitch range for synthesis.
pub const PITCH_RANGE: (f32, f32) = (-0.5, 0.5);

/// Fixed audio-output settings sent with every request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AudioSettings {
    pub intonation: f32,
    pub volume: f32,
    pub pre_phoneme_length: f32,
    pub post_phoneme_length: f32,
    pub sample_rate: u32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self { intonation: 1.0, volume: 1.0, pre_phoneme_length: 0.0, post_phoneme_length: 0.0, sample_rate: 44100 }
    }
}

impl AudioSettings {
    /// File extension of the audio the backends are asked to produce.
    pub fn extension(&self) -> &'static str {
        "wav"
    }
}

/// Everything a backend needs to synthesize one line.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    /// Text with label prefixes removed.
    pub text: String,
    pub speaker_key: SpeakerKey,
    pub speaker: SpeakerProfile,
    pub style_id: i64,
    pub speed: f32,
    pub pitch: f32,
    pub audio: AudioSettings,
}

impl SynthesisRequest {
    /// Name of the selected style, for logging.
    pub fn style_name(&self) -> &str {
        self.speaker.style_name(self.style_id).unwrap_or("デフォルト")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Repaired; synthesis continues with the corrected value.
    Warning,
    /// Not repairable; the line is skipped.
    Error,
}

/// One finding of the validator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub field: &'static str,
    pub message: String,
}

impl ValidationIssue {
    fn warning(field: &'static str, message: String) -> Self {
        Self { severity: Severity::Warning, field, message }
    }

    fn error(field: &'static str, message: String) -> Self {
        Self { severity: Severity::Error, field, message }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of validating a draft request.
#[derive(Debug, Clone)]
pub struct Validated {
    pub request: SynthesisRequest,
    pub issues: Vec<ValidationIssue>,
}

impl Validated {
    /// Whether any finding prevents synthesis.
    pub fn is_fatal(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }
}

/// Check a draft request against the speaker's declared constraints and repair what can be repaired.
///
/// Numeric parameters are clamped to the nearest bound and unknown styles fall back
/// to the first declared style. Only an empty text or an unidentified speaker is fatal.
pub fn validate(mut request: SynthesisRequest) -> Validated {
    let mut issues = Vec::new();

    if request.text.trim().is_empty() {
        issues.push(ValidationIssue::error("text", "text is empty".to_string()));
    }

    if request.speaker.id.trim().is_empty() {
        issues.push(ValidationIssue::error("speaker", format!("speaker {} has no id", request.speaker.display_name)));
    }

    if request.speaker.styles.is_empty() {
        issues.push(ValidationIssue::warning("style", format!("speaker {} declares no styles, using placeholder style 0", request.speaker.display_name)));
        request.speaker.styles.push(SpeakerStyle::placeholder());
    }

    let style_ids = request.speaker.style_ids();
    if !style_ids.contains(&request.style_id) {
        let fallback = style_ids[0];
        issues.push(ValidationIssue::warning("style", format!("unknown style id {} (valid: {:?}), using {}", request.style_id, style_ids, fallback)));
        request.style_id = fallback;
    }

    request.speed = repair("speed", request.speed, SPEED_RANGE, 1.0, &mut issues);
    request.pitch = repair("pitch", request.pitch, PITCH_RANGE, 0.0, &mut issues);

    Validated { request, issues }
}

/// Clamp a value into `range`, recording a warning when it had to move.
fn repair(field: &'static str, value: f32, range: (f32, f32), neutral: f32, issues: &mut Vec<ValidationIssue>) -> f32 {
    let (min, max) = range;
    if value.is_nan() {
        issues.push(ValidationIssue::warning(field, format!("{} is not a number, using {}", field, neutral)));
        return neutral;
    }
    if (min..=max).contains(&value) {
        return value;
    }
    let clamped = value.clamp(min, max);
    issues.push(ValidationIssue::warning(field, format!("{} {} out of range {}-{}, adjusted to {}", field, value, min, max, clamped)));
    clamped
}
