//! Audio module for per-line clips and the combined dialogue output.
//!
//! Clips are WAV files handled with hound; clips from different backends are
//! brought to a common format (with rubato resampling) before concatenation.

mod artifact;
mod combiner;
pub mod resampler;
pub mod util;
pub mod wav;

pub use artifact::AudioArtifact;
pub use combiner::{CombineMode, combine};
