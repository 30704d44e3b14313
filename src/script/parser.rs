//! Directive parser for dialogue scripts.
//!
//! A script is plain text where a bracketed speaker tag (`[男性]` or `[女性]`)
//! opens a block, optional `速度:` / `ピッチ:` directives set the block's prosody,
//! and every other non-blank line is spoken text joined into one dialogue line.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Neutral speech speed applied at every new speaker block.
pub const DEFAULT_SPEED: f32 = 1.0;

/// Neutral pitch applied at every new speaker block.
pub const DEFAULT_PITCH: f32 = 0.0;

static SPEAKER_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\[(男性|女性)\]").expect("valid speaker regex"));

static SPEED_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^(?:速度|speed)[:：]\s*([\d.]+)").expect("valid speed regex"));

static PITCH_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^(?:ピッチ|pitch)[:：]\s*([-\d.]+)").expect("valid pitch regex"));

static LABEL_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^(?:セリフ|line)[:：]\s*").expect("valid label regex"));

/// Which of the two script speakers a line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpeakerKey {
    /// First speaker, tagged `[男性]`.
    A,
    /// Second speaker, tagged `[女性]`.
    B,
}

impl SpeakerKey {
    /// Resolve a speaker tag (the text between the brackets).
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "男性" => Some(SpeakerKey::A),
            "女性" => Some(SpeakerKey::B),
            _ => None,
        }
    }

    /// The tag text used in scripts for this speaker.
    pub fn tag(&self) -> &'static str {
        match self {
            SpeakerKey::A => "男性",
            SpeakerKey::B => "女性",
        }
    }

    /// Position of this speaker in a backend's speaker roster.
    pub fn index(&self) -> usize {
        match self {
            SpeakerKey::A => 0,
            SpeakerKey::B => 1,
        }
    }
}

impl std::fmt::Display for SpeakerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// One parsed line of dialogue, ready for synthesis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DialogueLine {
    /// Raw joined text of the speaker block (label prefixes are kept for display).
    pub text: String,
    /// Speaker the block was tagged with.
    pub speaker: SpeakerKey,
    /// Speed multiplier declared for the block.
    pub speed: f32,
    /// Pitch offset declared for the block.
    pub pitch: f32,
}

/// Accumulator for the speaker block currently being read.
struct Block {
    speaker: SpeakerKey,
    text: Vec<String>,
    speed: f32,
    pitch: f32,
}

impl Block {
    fn new(speaker: SpeakerKey) -> Self {
        Self { speaker, text: Vec::new(), speed: DEFAULT_SPEED, pitch: DEFAULT_PITCH }
    }

    /// Turn the block into a dialogue line; tag-only blocks produce nothing.
    fn finish(self) -> Option<DialogueLine> {
        if self.text.is_empty() {
            debug!("Speaker block [{}] has no text, skipping", self.speaker);
            return None;
        }
        Some(DialogueLine { text: self.text.join(" "), speaker: self.speaker, speed: self.speed, pitch: self.pitch })
    }
}

/// Parse a whole script into dialogue lines, preserving source order.
///
/// Lines before the first speaker tag are discarded. Unknown bracket content
/// is treated as plain text. Directives with unparsable numbers are ignored.
pub fn parse_script(content: &str) -> Vec<DialogueLine> {
    let mut lines = Vec::new();
    let mut current: Option<Block> = None;

    for raw in content.lines() {
        let text = raw.trim();
        if text.is_empty() {
            continue;
        }

        if let Some(speaker) = SPEAKER_TAG.captures(text).and_then(|caps| SpeakerKey::from_tag(&caps[1])) {
            debug!("Speaker tag: [{}]", speaker);
            if let Some(line) = current.take().and_then(Block::finish) {
                lines.push(line);
            }
            current = Some(Block::new(speaker));
            continue;
        }

        if let Some(caps) = SPEED_DIRECTIVE.captures(text) {
            match caps[1].parse::<f32>() {
                Ok(speed) => {
                    debug!("Speed directive: {}", speed);
                    if let Some(block) = current.as_mut() {
                        block.speed = speed;
                    }
                }
                Err(_) => warn!("Ignoring speed directive with invalid number: '{}'", text),
            }
            continue;
        }

        if let Some(caps) = PITCH_DIRECTIVE.captures(text) {
            match caps[1].parse::<f32>() {
                Ok(pitch) => {
                    debug!("Pitch directive: {}", pitch);
                    if let Some(block) = current.as_mut() {
                        block.pitch = pitch;
                    }
                }
                Err(_) => warn!("Ignoring pitch directive with invalid number: '{}'", text),
            }
            continue;
        }

        match current.as_mut() {
            Some(block) => block.text.push(text.to_string()),
            None => debug!("Discarding text before first speaker tag: '{}'", text),
        }
    }

    if let Some(line) = current.take().and_then(Block::finish) {
        lines.push(line);
    }

    debug!("Parsed {} dialogue line(s)", lines.len());
    lines
}

/// Strip a leading `セリフ:`-style label and surrounding whitespace.
pub fn clean_text(text: &str) -> String {
    LABEL_PREFIX.replace(text.trim(), "").trim().to_string()
}
