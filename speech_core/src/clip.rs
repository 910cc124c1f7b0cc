//! Synthesized audio clips.
//!
//! An [`AudioClip`] is the immutable byte payload returned by the synthesis
//! service. Cloning it only bumps a reference count, so the cache and a queue
//! item can both hold the same buffer; the buffer is freed once the last
//! holder drops it. WAV payloads can be inspected and decoded with `hound`.
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use crate::error::SinkError;

#[derive(Clone, PartialEq, Eq)]
pub struct AudioClip {
    bytes: Arc<[u8]>,
}

impl std::fmt::Debug for AudioClip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioClip")
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Format details of a WAV clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavInfo {
    pub sample_rate: u32,
    pub channels: u16,
    /// Samples per channel.
    pub frames: u32,
}

impl WavInfo {
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames as f64 / self.sample_rate as f64)
    }
}

impl AudioClip {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: Arc::from(bytes.into()),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Number of live holders of the underlying buffer.
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.bytes)
    }

    /// Read the WAV header.
    pub fn wav_info(&self) -> Result<WavInfo, SinkError> {
        let reader = hound::WavReader::new(Cursor::new(self.as_bytes()))
            .map_err(|e| SinkError::Unsupported(format!("not a WAV clip: {e}")))?;
        let spec = reader.spec();
        Ok(WavInfo {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            frames: reader.duration(),
        })
    }

    /// Decode all samples to interleaved f32 in [-1.0, 1.0].
    pub fn decode_samples(&self) -> Result<(Vec<f32>, WavInfo), SinkError> {
        let info = self.wav_info()?;
        let mut reader = hound::WavReader::new(Cursor::new(self.as_bytes()))
            .map_err(|e| SinkError::Unsupported(format!("not a WAV clip: {e}")))?;
        let spec = reader.spec();

        let samples = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Int, 16) => reader
                .samples::<i16>()
                .map(|s| s.map(|v| v as f32 / I16_MAX_F32))
                .collect::<Result<Vec<_>, _>>(),
            (hound::SampleFormat::Float, 32) => reader.samples::<f32>().collect(),
            (format, bits) => {
                return Err(SinkError::Unsupported(format!(
                    "{bits}-bit {format:?} WAV samples"
                )))
            }
        }
        .map_err(|e| SinkError::Unsupported(format!("corrupt WAV data: {e}")))?;

        Ok((samples, info))
    }
}

const I16_MAX_F32: f32 = i16::MAX as f32;

/// Encode mono f32 samples as a 16-bit PCM WAV payload.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    // WAV header (44 bytes) + 2 bytes per sample
    let mut cursor = Cursor::new(Vec::<u8>::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &s in samples {
            writer.write_sample((s.clamp(-1.0, 1.0) * I16_MAX_F32) as i16)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// A silent mono clip of the given length.
pub fn silence(duration: Duration, sample_rate: u32) -> Result<AudioClip, hound::Error> {
    let frames = (duration.as_secs_f64() * sample_rate as f64).round() as usize;
    encode_wav(&vec![0.0; frames], sample_rate).map(AudioClip::from_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_info_reports_duration() {
        let clip = silence(Duration::from_millis(500), 16_000).unwrap();
        let info = clip.wav_info().unwrap();
        assert_eq!(info.sample_rate, 16_000);
        assert_eq!(info.channels, 1);
        assert_eq!(info.frames, 8_000);
        assert_eq!(info.duration(), Duration::from_millis(500));
    }

    #[test]
    fn decode_clamps_and_scales() {
        let bytes = encode_wav(&[0.0, 0.5, 2.0, -2.0], 8_000).unwrap();
        let (samples, info) = AudioClip::from_bytes(bytes).decode_samples().unwrap();
        assert_eq!(info.frames, 4);
        assert_eq!(samples[0], 0.0);
        assert!((samples[1] - 0.5).abs() < 1e-3);
        assert!((samples[2] - 1.0).abs() < 1e-6);
        assert!((samples[3] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn non_wav_payload_is_unsupported() {
        let clip = AudioClip::from_bytes(b"ID3\x03mp3-ish".to_vec());
        assert!(matches!(clip.wav_info(), Err(SinkError::Unsupported(_))));
    }

    #[test]
    fn clones_share_one_buffer() {
        let clip = AudioClip::from_bytes(vec![1u8, 2, 3]);
        let other = clip.clone();
        assert_eq!(clip.holders(), 2);
        drop(other);
        assert_eq!(clip.holders(), 1);
    }
}
