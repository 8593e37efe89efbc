//! Narration audio decoding
//!
//! Pure data transforms only: the decode step never touches an audio device,
//! so it stays unit-testable. Playback belongs to the presentation layer.

mod pcm;

pub use pcm::{decode_base64, decode_pcm, AudioError, NarrationAudio, NARRATION_SAMPLE_RATE};
