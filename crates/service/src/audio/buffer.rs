use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use wastewise_core::{SPEECH_CHANNELS, SPEECH_SAMPLE_RATE};

use crate::error::AudioError;

/// Decoded, playable speech.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl AudioBuffer {
    #[must_use]
    pub const fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self { samples, sample_rate, channels }
    }

    /// Decodes the speech endpoint's raw PCM (16-bit LE, mono, 24 kHz).
    ///
    /// # Errors
    /// Returns `AudioError::Decode` for empty or odd-length input.
    pub fn from_pcm16(pcm: &[u8]) -> Result<Self, AudioError> {
        Ok(Self::new(decode_pcm16(pcm)?, SPEECH_SAMPLE_RATE, SPEECH_CHANNELS))
    }

    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[must_use]
    pub const fn channels(&self) -> u16 {
        self.channels
    }

    /// Samples per channel.
    #[must_use]
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels.max(1))
    }

    /// Length in seconds.
    #[must_use]
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_secs())
    }
}

/// Converts 16-bit little-endian PCM to samples in `[-1, 1)`.
///
/// # Errors
/// Returns `AudioError::Decode` for empty or odd-length input.
pub fn decode_pcm16(pcm: &[u8]) -> Result<Vec<f32>, AudioError> {
    if pcm.is_empty() {
        return Err(AudioError::Decode("no audio data".to_owned()));
    }
    if pcm.len() % 2 != 0 {
        return Err(AudioError::Decode(format!("odd PCM length {}", pcm.len())));
    }
    Ok(pcm
        .chunks_exact(2)
        .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / 32768.0)
        .collect())
}

/// Decoded buffers by history item id. Append-only for the session.
#[derive(Debug, Default)]
pub struct AudioBufferCache {
    buffers: RwLock<HashMap<String, Arc<AudioBuffer>>>,
}

impl AudioBufferCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, item_id: &str) -> Option<Arc<AudioBuffer>> {
        self.buffers.read().unwrap_or_else(PoisonError::into_inner).get(item_id).cloned()
    }

    /// Stores `buffer` unless the item already has one, returning the cached buffer.
    pub fn insert(&self, item_id: &str, buffer: AudioBuffer) -> Arc<AudioBuffer> {
        let mut buffers = self.buffers.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(buffers.entry(item_id.to_owned()).or_insert_with(|| Arc::new(buffer)))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buffers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
