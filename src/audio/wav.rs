//! WAV decoding and encoding helpers built on hound.

use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

/// Decoded PCM audio as interleaved f32 samples in [-1.0, 1.0].
#[derive(Debug, Clone, PartialEq)]
pub struct PcmClip {
    pub samples: Vec<f32>,
    pub spec: WavSpec,
}

impl PcmClip {
    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.spec.channels.max(1) as usize
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.spec.sample_rate as f64
    }
}

/// Read a WAV file into normalized f32 samples.
pub fn read_clip(path: &Path) -> Result<PcmClip> {
    let reader = WavReader::open(path).with_context(|| format!("Failed to open WAV file {}", path.display()))?;
    decode(reader).with_context(|| format!("Failed to decode WAV file {}", path.display()))
}

fn decode<R: std::io::Read>(mut reader: WavReader<R>) -> Result<PcmClip> {
    let spec = reader.spec();
    let samples = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<std::result::Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let scale = int_scale(spec.bits_per_sample);
            reader.samples::<i32>().map(|s| s.map(|v| v as f32 / scale)).collect::<std::result::Result<Vec<_>, _>>()?
        }
    };
    Ok(PcmClip { samples, spec })
}

/// Full-scale magnitude of a signed integer sample of the given bit depth.
fn int_scale(bits: u16) -> f32 {
    (1_i64 << (bits.clamp(1, 32) - 1)) as f32
}

/// Streaming WAV writer that quantizes f32 samples to the target spec.
pub struct ClipWriter<W: std::io::Write + std::io::Seek> {
    writer: WavWriter<W>,
    spec: WavSpec,
}

impl ClipWriter<std::io::BufWriter<std::fs::File>> {
    /// Create a WAV file at `path`.
    pub fn create(path: &Path, spec: WavSpec) -> Result<Self> {
        let writer = WavWriter::create(path, spec).with_context(|| format!("Failed to create WAV file {}", path.display()))?;
        Ok(Self { writer, spec })
    }
}

impl<W: std::io::Write + std::io::Seek> ClipWriter<W> {
    /// Append interleaved samples (must already match the writer's channel count).
    pub fn write(&mut self, samples: &[f32]) -> Result<()> {
        match self.spec.sample_format {
            SampleFormat::Float => {
                for &s in samples {
                    self.writer.write_sample(s)?;
                }
            }
            SampleFormat::Int => {
                let scale = int_scale(self.spec.bits_per_sample);
                let max = scale - 1.0;
                for &s in samples {
                    let v = (s * scale).round().clamp(-scale, max);
                    match self.spec.bits_per_sample {
                        bits if bits <= 8 => self.writer.write_sample(v as i8)?,
                        bits if bits <= 16 => self.writer.write_sample(v as i16)?,
                        _ => self.writer.write_sample(v as i32)?,
                    }
                }
            }
        }
        Ok(())
    }

    /// Append `frames` frames of digital silence.
    pub fn write_silence(&mut self, frames: usize) -> Result<()> {
        let silence = vec![0.0f32; frames * self.spec.channels as usize];
        self.write(&silence)
    }

    /// Flush and fix up the WAV header.
    pub fn finish(self) -> Result<()> {
        self.writer.finalize().context("Failed to finalize WAV output")
    }
}

/// Encode mono f32 samples as a 16-bit PCM WAV byte buffer.
pub fn encode_mono_i16(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = WavSpec { channels: 1, sample_rate, bits_per_sample: 16, sample_format: SampleFormat::Int };
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut writer = ClipWriter { writer: WavWriter::new(&mut buffer, spec)?, spec };
        writer.write(samples)?;
        writer.finish()?;
    }
    Ok(buffer.into_inner())
}


#[cfg(test)]
mod tests {
    use super::testing::tone_wav;
    use super::*;

    #[test]
    fn test_encode_and_read_back_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        std::fs::write(&path, tone_wav(250, 24000)).unwrap();

        let clip = read_clip(&path).unwrap();
        assert_eq!(clip.spec.sample_rate, 24000);
        assert_eq!(clip.frames(), 6000);
        assert!((clip.duration_secs() - 0.25).abs() < 1e-9);
        assert!(clip.samples.iter().all(|s| (-1.0..=1.0).contains(s)));
    }

    #[test]
    fn test_read_rejects_non_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bogus.wav");
        std::fs::write(&path, b"not a wav file").unwrap();
        assert!(read_clip(&path).is_err());
    }
}
