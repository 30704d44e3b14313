//! Dialogue script module.
//!
//! Parses speaker-annotated scripts into ordered dialogue lines.

mod parser;

pub use parser::{DialogueLine, SpeakerKey, clean_text, parse_script};
