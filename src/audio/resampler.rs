//! Audio resampling using rubato's FFT-based resampler.
//!
//! Used to bring clips from different backends to a common sample rate before
//! they are concatenated.

use anyhow::{Context, Result};
use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{Fft, FixedSync, Resampler};

/// Chunk size for FFT-based resampling (provides good quality and performance).
const CHUNK_SIZE: usize = 1024;

/// Number of sub-chunks for FFT processing (higher = better quality but more CPU).
const SUB_CHUNKS: usize = 2;

/// Resample interleaved audio from one sample rate to another.
///
/// The whole buffer is processed at once. The filter delay is dropped from the
/// front and the output is trimmed to the exact expected length, so clip
/// timing and durations are preserved.
///
/// # Arguments
/// * `samples` - Interleaved input samples
/// * `channels` - Number of interleaved channels
/// * `from_rate` - Input sample rate (e.g., 24000 for Kokoro)
/// * `to_rate` - Output sample rate (e.g., 44100 for the engine)
///
/// # Returns
/// Resampled interleaved samples at the target rate
pub fn resample(samples: &[f32], channels: usize, from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    // No resampling needed if rates match
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let channels = channels.max(1);
    let mut resampler = Fft::<f32>::new(from_rate as usize, to_rate as usize, CHUNK_SIZE, SUB_CHUNKS, channels, FixedSync::Input).context("Failed to create resampler")?;

    // The resampler may round the chunk size up to suit the rate ratio
    let chunk_frames = resampler.input_frames_next();
    let output_frames_max = resampler.output_frames_max();
    let mut output_buffer = vec![0.0f32; output_frames_max * channels];

    let input_frames = samples.len() / channels;
    let expected_frames = (input_frames as f64 * to_rate as f64 / from_rate as f64).round() as usize;
    let mut output = Vec::with_capacity((expected_frames + 2 * output_frames_max) * channels);

    // Leading frames the filter emits before the first input sample
    let delay = resampler.output_delay();
    let wanted = (delay + expected_frames) * channels;

    // Keep feeding silence after the input until the delayed tail has been flushed
    let mut pos = 0;
    while pos < input_frames || output.len() < wanted {
        let start = pos.min(input_frames);
        let end = (pos + chunk_frames).min(input_frames);
        let mut chunk = samples[start * channels..end * channels].to_vec();

        // Pad the last chunk if needed
        chunk.resize(chunk_frames * channels, 0.0);

        let input_adapter = InterleavedSlice::new(&chunk, channels, chunk_frames).context("Failed to create input adapter")?;
        let mut output_adapter = InterleavedSlice::new_mut(&mut output_buffer, channels, output_frames_max).context("Failed to create output adapter")?;

        let (_, frames_written) = resampler.process_into_buffer(&input_adapter, &mut output_adapter, None).map_err(|e| anyhow::anyhow!("Resampling error: {}", e))?;
        output.extend_from_slice(&output_buffer[..frames_written * channels]);

        pos += chunk_frames;
    }

    output.drain(..(delay * channels).min(output.len()));
    output.resize(expected_frames * channels, 0.0);

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_upsampling() {
        // Upsample from 16kHz to 48kHz (3x)
        let samples = vec![0.0; 16000];
        let result = resample(&samples, 1, 16000, 48000).unwrap();
        assert_eq!(result.len(), 48000);
    }

    #[test]
    fn test_resample_downsampling_stereo() {
        // 1 second of stereo at 48kHz down to 16kHz
        let samples = vec![0.0; 96000];
        let result = resample(&samples, 2, 48000, 16000).unwrap();
        assert_eq!(result.len(), 32000);
    }

    #[test]
    fn test_resample_keeps_onset_timing() {
        // 1s of silence then 0.1s of a 440Hz tone, 24kHz to 44.1kHz
        let mut samples = vec![0.0f32; 24000];
        samples.extend((0..2400).map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 24000.0).sin() * 0.8));

        let result = resample(&samples, 1, 24000, 44100).unwrap();
        assert_eq!(result.len(), 48510);

        let onset = result.iter().position(|s| s.abs() > 0.05).unwrap();
        assert!(onset.abs_diff(44100) <= 30, "tone starts at frame {}", onset);
        assert!(result[48510 - 200..].iter().any(|s| s.abs() > 0.05), "tail of the tone was cut");
    }

    #[test]
    fn test_same_rate_is_a_copy() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(resample(&samples, 1, 24000, 24000).unwrap(), samples);
    }
}
