//! Ordered concatenation of synthesized clips with silence gaps.

use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use super::artifact::AudioArtifact;
use super::resampler::resample;
use super::util::{remix_channels, silence_frames};
use super::wav::{ClipWriter, PcmClip, read_clip};

/// Silence inserted between consecutive clips.
pub const GAP_MILLIS: u64 = 500;

/// How the combined output was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineMode {
    /// A single clip copied byte-for-byte.
    Copied,
    /// All clips decoded, normalized, and joined with gaps.
    Concatenated,
    /// Clips could not be decoded; the first clip was copied alone.
    FirstOnly,
}

/// Combine `artifacts` in order into one file at `output`.
///
/// The first clip's format is the target; other clips are remixed and resampled
/// to match. If any clip cannot be decoded, the first clip is copied instead.
///
/// # Errors
/// Returns an error if there is nothing to combine or even the fallback copy fails.
pub fn combine(artifacts: &[AudioArtifact], output: &Path) -> Result<CombineMode> {
    let Some(first) = artifacts.first() else {
        bail!("No audio clips to combine");
    };

    if artifacts.len() == 1 {
        std::fs::copy(first.path(), output).with_context(|| format!("Failed to copy clip to {}", output.display()))?;
        info!("Single clip copied to {}", output.display());
        return Ok(CombineMode::Copied);
    }

    match concatenate(artifacts, output) {
        Ok(()) => {
            info!("🎵 Combined {} clips into {}", artifacts.len(), output.display());
            Ok(CombineMode::Concatenated)
        }
        Err(e) => {
            warn!("Failed to combine clips ({:#}), falling back to the first clip", e);
            if output.exists()
                && let Err(e) = std::fs::remove_file(output)
            {
                debug!("Failed to remove partial output {}: {}", output.display(), e);
            }
            std::fs::copy(first.path(), output).with_context(|| format!("Failed to copy first clip to {}", output.display()))?;
            Ok(CombineMode::FirstOnly)
        }
    }
}

fn concatenate(artifacts: &[AudioArtifact], output: &Path) -> Result<()> {
    // Decode everything up front so a bad clip never leaves a half-written output
    let clips = artifacts.iter().map(|a| read_clip(a.path())).collect::<Result<Vec<PcmClip>>>()?;

    let target = clips[0].spec;
    let gap = silence_frames(GAP_MILLIS, target.sample_rate);
    debug!("Combining {} clips at {} Hz, {} channel(s), {} gap frames", clips.len(), target.sample_rate, target.channels, gap);

    let mut writer = ClipWriter::create(output, target)?;
    let last = clips.len() - 1;

    for (i, clip) in clips.iter().enumerate() {
        let mut samples = remix_channels(&clip.samples, clip.spec.channels as usize, target.channels as usize);
        if clip.spec.sample_rate != target.sample_rate {
            debug!("Resampling clip {} from {} Hz to {} Hz", i + 1, clip.spec.sample_rate, target.sample_rate);
            samples = resample(&samples, target.channels as usize, clip.spec.sample_rate, target.sample_rate)?;
        }
        writer.write(&samples)?;

        if i != last {
            writer.write_silence(gap)?;
        }
    }

    writer.finish()
}

#[cfg(test)]
mod tests {
    use hound::{SampleFormat, WavSpec};

    use super::*;
    use crate::audio::wav::testing::{tone_wav, write_tone};

    fn artifact(dir: &Path, index: usize, bytes: &[u8]) -> AudioArtifact {
        AudioArtifact::persist(dir, index, "wav", bytes).unwrap()
    }

    #[test]
    fn test_two_clips_are_joined_with_one_gap() {
        let dir = tempfile::tempdir().unwrap();
        let clips = vec![artifact(dir.path(), 0, &tone_wav(200, 44100)), artifact(dir.path(), 1, &tone_wav(300, 44100))];
        let output = dir.path().join("out.wav");

        assert_eq!(combine(&clips, &output).unwrap(), CombineMode::Concatenated);

        let combined = read_clip(&output).unwrap();
        assert_eq!(combined.frames(), 8820 + 22050 + 13230);
        assert!((combined.duration_secs() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_single_clip_is_copied_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = tone_wav(400, 24000);
        let clips = vec![artifact(dir.path(), 0, &bytes)];
        let output = dir.path().join("out.wav");

        assert_eq!(combine(&clips, &output).unwrap(), CombineMode::Copied);
        assert_eq!(std::fs::read(&output).unwrap(), bytes);
    }

    #[test]
    fn test_gap_is_not_appended_after_last_clip() {
        let dir = tempfile::tempdir().unwrap();
        let clips = vec![artifact(dir.path(), 0, &tone_wav(100, 16000)), artifact(dir.path(), 1, &tone_wav(100, 16000)), artifact(dir.path(), 2, &tone_wav(100, 16000))];
        let output = dir.path().join("out.wav");

        combine(&clips, &output).unwrap();
        let combined = read_clip(&output).unwrap();
        assert_eq!(combined.frames(), 3 * 1600 + 2 * 8000);
    }

    #[test]
    fn test_heterogeneous_clips_are_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let stereo = WavSpec { channels: 2, sample_rate: 48000, bits_per_sample: 16, sample_format: SampleFormat::Int };
        let stereo_path = dir.path().join("stereo.wav");
        write_tone(&stereo_path, 500, stereo);

        let clips = vec![artifact(dir.path(), 0, &std::fs::read(&stereo_path).unwrap()), artifact(dir.path(), 1, &tone_wav(500, 24000))];
        let output = dir.path().join("out.wav");

        assert_eq!(combine(&clips, &output).unwrap(), CombineMode::Concatenated);
        let combined = read_clip(&output).unwrap();
        assert_eq!(combined.spec.channels, 2);
        assert_eq!(combined.spec.sample_rate, 48000);
        assert_eq!(combined.frames(), 24000 + 24000 + 24000);
    }

    #[test]
    fn test_undecodable_clip_falls_back_to_first() {
        let dir = tempfile::tempdir().unwrap();
        let first = tone_wav(200, 44100);
        let clips = vec![artifact(dir.path(), 0, &first), artifact(dir.path(), 1, b"ID3 not a wav")];
        let output = dir.path().join("out.wav");

        assert_eq!(combine(&clips, &output).unwrap(), CombineMode::FirstOnly);
        assert_eq!(std::fs::read(&output).unwrap(), first);
    }

    #[test]
    fn test_empty_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(combine(&[], &dir.path().join("out.wav")).is_err());
    }
}
