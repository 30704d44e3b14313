//! Speaker profiles exposed by synthesis backends.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::script::SpeakerKey;

/// Known engine speaker UUIDs and the display names scripts refer to them by.
const KNOWN_SPEAKERS: &[(&str, &str)] = &[("d312d0fb-d38d-434e-825d-cbcbfd105ad0", "男性"), ("3c37646f-3881-5374-2a83-149267990abc", "女性")];

/// One selectable style of a speaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeakerStyle {
    pub id: i64,
    pub name: String,
}

impl SpeakerStyle {
    /// Style used when a speaker declares none.
    pub fn placeholder() -> Self {
        Self { id: 0, name: "デフォルト".to_string() }
    }
}

/// A speaker as declared by a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerProfile {
    /// Backend-specific identifier (engine UUID, cloud voice name, model voice name).
    pub id: String,
    pub display_name: String,
    /// Ordered styles; the first one is the default.
    pub styles: Vec<SpeakerStyle>,
}

impl SpeakerProfile {
    /// Build a profile from an engine speaker, naming it from the known UUID table.
    pub fn from_engine(uuid: &str, styles: Vec<SpeakerStyle>) -> Self {
        let display_name = KNOWN_SPEAKERS
            .iter()
            .find(|(known, _)| *known == uuid)
            .map(|(_, name)| name.to_string())
            .unwrap_or_else(|| format!("スピーカー_{}", uuid.chars().take(8).collect::<String>()));

        let styles = if styles.is_empty() {
            warn!("Speaker {} declares no styles, using placeholder style", display_name);
            vec![SpeakerStyle::placeholder()]
        } else {
            styles
        };

        Self { id: uuid.to_string(), display_name, styles }
    }

    /// Profile for backends addressed by a fixed voice per speaker key.
    pub fn for_voice(key: SpeakerKey, voice: &str) -> Self {
        Self { id: voice.to_string(), display_name: key.tag().to_string(), styles: vec![SpeakerStyle { id: 0, name: "ノーマル".to_string() }] }
    }

    /// Ids of all declared styles, in order.
    pub fn style_ids(&self) -> Vec<i64> {
        self.styles.iter().map(|s| s.id).collect()
    }

    /// Name of a declared style, if present.
    pub fn style_name(&self, style_id: i64) -> Option<&str> {
        self.styles.iter().find(|s| s.id == style_id).map(|s| s.name.as_str())
    }
}

/// Speaker profiles fetched once at startup and injected into the pipeline.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SpeakerRoster {
    speakers: Vec<SpeakerProfile>,
}

impl SpeakerRoster {
    pub fn new(speakers: Vec<SpeakerProfile>) -> Self {
        Self { speakers }
    }

    /// Resolve the profile for a script speaker by roster position.
    pub fn resolve(&self, key: SpeakerKey) -> Option<&SpeakerProfile> {
        self.speakers.get(key.index())
    }

    pub fn len(&self) -> usize {
        self.speakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.speakers.is_empty()
    }

    /// Print the roster in a readable table.
    pub fn print(&self) {
        println!("═══════════════════════════════════════════════════════════════════");
        println!("  Available speakers ({})", self.speakers.len());
        println!("═══════════════════════════════════════════════════════════════════");

        for (index, speaker) in self.speakers.iter().enumerate() {
            println!("\n[{}] {} ({})", index, speaker.display_name, speaker.id);
            for style in &speaker.styles {
                println!("    - {} (ID: {})", style.name, style.id);
            }
        }

        println!();
        println!("Script tags: [男性] -> speaker 0, [女性] -> speaker 1");
    }
}
