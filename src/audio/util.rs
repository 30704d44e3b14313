//! Shared sample-level helpers for combining clips.

/// Remix interleaved f32 samples to a different channel count.
///
/// - Same count: returns a copy of the input
/// - To mono: averages each frame
/// - From mono: duplicates the sample to every output channel
/// - Otherwise: output channel `c` takes input channel `c % from`
///
/// # Arguments
/// * `data` - Interleaved samples
/// * `from` - Channel count of `data`
/// * `to` - Desired channel count
pub fn remix_channels(data: &[f32], from: usize, to: usize) -> Vec<f32> {
    if from == to || from == 0 || to == 0 {
        return data.to_vec();
    }

    if to == 1 {
        return data.chunks(from).map(|frame| frame.iter().sum::<f32>() / frame.len() as f32).collect();
    }

    data.chunks(from).flat_map(|frame| (0..to).map(move |c| frame[c % frame.len()])).collect()
}

/// Number of frames of silence for a gap of `millis` at `sample_rate`.
pub fn silence_frames(millis: u64, sample_rate: u32) -> usize {
    (sample_rate as u64 * millis / 1000) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stereo_to_mono() {
        let data = vec![0.5f32, 1.0, -0.5, -1.0];
        let result = remix_channels(&data, 2, 1);
        assert_eq!(result, vec![0.75, -0.75]);
    }

    #[test]
    fn test_mono_to_stereo() {
        let result = remix_channels(&[0.1, 0.2], 1, 2);
        assert_eq!(result, vec![0.1, 0.1, 0.2, 0.2]);
    }

    #[test]
    fn test_silence_frames() {
        assert_eq!(silence_frames(500, 44100), 22050);
        assert_eq!(silence_frames(500, 24000), 12000);
    }
}
