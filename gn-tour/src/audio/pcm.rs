//! Raw PCM decoding for synthesized narration
//!
//! The narration capability returns base64-encoded signed 16-bit
//! little-endian PCM. This module converts that payload into a normalized
//! f32 buffer: base64 → bytes → interleaved samples in [-1.0, 1.0).
//!
//! A byte sequence whose length is not a multiple of one frame
//! (`2 * channel_count` bytes) is rejected rather than truncated: a partial
//! frame carries no complete sample and indicates a corrupt payload.

use base64::{engine::general_purpose, Engine as _};
use thiserror::Error;

/// Sample rate of Gemini TTS narration output (Hz)
pub const NARRATION_SAMPLE_RATE: u32 = 24_000;

/// Audio decoding errors
#[derive(Debug, Error)]
pub enum AudioError {
    /// Input was not valid standard-alphabet base64
    #[error("Invalid base64 audio payload: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Byte length is not a whole number of sample frames
    #[error("Partial PCM frame: {byte_len} bytes is not a multiple of {frame_len}")]
    PartialFrame { byte_len: usize, frame_len: usize },

    /// Sample rate or channel count of zero
    #[error("Invalid audio parameters: sample_rate={sample_rate}, channels={channels}")]
    InvalidParameters { sample_rate: u32, channels: u16 },
}

/// Decoded narration audio
///
/// Interleaved normalized samples at a fixed rate. Owned by the run that
/// produced it and discarded on reset.
#[derive(Debug, Clone)]
pub struct NarrationAudio {
    /// Interleaved samples, range [-1.0, 1.0)
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Channel count
    pub channels: u16,
}

impl NarrationAudio {
    /// Number of sample frames (samples per channel)
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }
}

/// Decode a standard-alphabet base64 string to raw bytes
///
/// Fails on characters outside the base64 alphabet or incorrect padding.
pub fn decode_base64(s: &str) -> Result<Vec<u8>, AudioError> {
    Ok(general_purpose::STANDARD.decode(s)?)
}

/// Decode signed 16-bit little-endian PCM bytes to a normalized buffer
///
/// Each 2-byte chunk is interpreted as an i16 in [-32768, 32767] and
/// normalized by dividing by 32768.0, yielding [-1.0, 0.999...]. The output
/// holds `bytes.len() / (2 * channels)` frames tagged with `sample_rate`.
///
/// Pure function: no device access, no side effects.
pub fn decode_pcm(bytes: &[u8], sample_rate: u32, channels: u16) -> Result<NarrationAudio, AudioError> {
    if sample_rate == 0 || channels == 0 {
        return Err(AudioError::InvalidParameters {
            sample_rate,
            channels,
        });
    }

    let frame_len = 2 * channels as usize;
    if bytes.len() % frame_len != 0 {
        return Err(AudioError::PartialFrame {
            byte_len: bytes.len(),
            frame_len,
        });
    }

    let samples = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect();

    Ok(NarrationAudio {
        samples,
        sample_rate,
        channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Quantize normalized samples back to s16le bytes (round-trip helper)
    fn encode_pcm(samples: &[f32]) -> Vec<u8> {
        samples
            .iter()
            .flat_map(|&v| {
                let q = (v * 32768.0).clamp(-32768.0, 32767.0) as i16;
                q.to_le_bytes()
            })
            .collect()
    }

    #[test]
    fn test_decode_base64_valid() {
        let bytes = decode_base64("AAD/fw==").unwrap();
        assert_eq!(bytes, vec![0x00, 0x00, 0xff, 0x7f]);
    }

    #[test]
    fn test_decode_base64_rejects_invalid_characters() {
        assert!(decode_base64("not base64 !!!").is_err());
    }

    #[test]
    fn test_decode_base64_rejects_bad_padding() {
        assert!(decode_base64("AAAA=").is_err());
    }

    #[test]
    fn test_decode_pcm_sample_count_and_range() {
        // i16::MIN, 0, i16::MAX as little-endian pairs
        let bytes = [0x00, 0x80, 0x00, 0x00, 0xff, 0x7f];
        let audio = decode_pcm(&bytes, NARRATION_SAMPLE_RATE, 1).unwrap();

        assert_eq!(audio.samples.len(), 3);
        assert_eq!(audio.samples[0], -1.0);
        assert_eq!(audio.samples[1], 0.0);
        assert!(audio.samples[2] < 1.0 && audio.samples[2] > 0.999);
        for &s in &audio.samples {
            assert!((-1.0..1.0).contains(&s));
        }
    }

    #[test]
    fn test_decode_pcm_rejects_partial_frame() {
        let result = decode_pcm(&[0x00, 0x01, 0x02], 24_000, 1);
        assert!(matches!(
            result,
            Err(AudioError::PartialFrame {
                byte_len: 3,
                frame_len: 2
            })
        ));
    }

    #[test]
    fn test_decode_pcm_rejects_partial_stereo_frame() {
        // 6 bytes is 3 mono samples but 1.5 stereo frames
        let result = decode_pcm(&[0; 6], 24_000, 2);
        assert!(matches!(result, Err(AudioError::PartialFrame { .. })));
    }

    #[test]
    fn test_decode_pcm_rejects_zero_parameters() {
        assert!(matches!(
            decode_pcm(&[0, 0], 0, 1),
            Err(AudioError::InvalidParameters { .. })
        ));
        assert!(matches!(
            decode_pcm(&[0, 0], 24_000, 0),
            Err(AudioError::InvalidParameters { .. })
        ));
    }

    #[test]
    fn test_stereo_frame_count() {
        let bytes = [0u8; 16]; // 8 samples, 4 stereo frames
        let audio = decode_pcm(&bytes, 48_000, 2).unwrap();
        assert_eq!(audio.frame_count(), 4);
        assert_eq!(audio.samples.len(), 8);
    }

    #[test]
    fn test_round_trip_within_one_quantization_step() {
        let original: Vec<f32> = vec![-1.0, -0.5, -0.25, 0.0, 0.1, 0.333, 0.7071, 0.9999];
        let bytes = encode_pcm(&original);
        let audio = decode_pcm(&bytes, NARRATION_SAMPLE_RATE, 1).unwrap();

        assert_eq!(audio.samples.len(), original.len());
        for (decoded, &expected) in audio.samples.iter().zip(&original) {
            assert!(
                (decoded - expected).abs() <= 1.0 / 32768.0,
                "decoded {} differs from {} by more than one quantization step",
                decoded,
                expected
            );
        }
    }

    #[test]
    fn test_duration_calculation() {
        // 4800 mono samples at 24 kHz is 0.2 seconds
        let bytes = vec![0u8; 4800 * 2];
        let audio = decode_pcm(&bytes, NARRATION_SAMPLE_RATE, 1).unwrap();

        assert_eq!(audio.frame_count(), 4800);
        assert!((audio.duration_seconds() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_empty_payload_is_valid() {
        let audio = decode_pcm(&[], 24_000, 1).unwrap();
        assert_eq!(audio.frame_count(), 0);
        assert_eq!(audio.duration_seconds(), 0.0);
    }
}
