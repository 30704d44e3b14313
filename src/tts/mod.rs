//! Speech synthesis: backends, the fallback chain and per-line dispatch.
//!
//! Backends are a local COEIROINK-compatible engine, Google Cloud TTS and an
//! optional offline Kokoro model.

mod backend;
mod cloud;
mod dispatcher;
mod engine;
mod process;
mod request;
mod speaker;
#[cfg_attr(not(feature = "kokoro"), allow(dead_code))]
mod synthesizer;

#[cfg(test)]
pub(crate) use backend::mock;
pub use backend::{BackendChain, BackendError, SpeechBackend};
pub use cloud::{CloudBackend, CloudVoices, GOOGLE_TTS_URL};
pub use dispatcher::{Dispatcher, SkippedLine};
pub use engine::EngineBackend;
pub use process::EngineProcess;
pub use request::AudioSettings;
pub use speaker::SpeakerRoster;
#[cfg(test)]
pub(crate) use speaker::SpeakerProfile;
#[cfg(feature = "kokoro")]
pub use synthesizer::KokoroBackend;
