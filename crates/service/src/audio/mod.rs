//! Speech playback: PCM decoding, per-item buffer cache, the output device
//! handle and the playback state machine.

mod buffer;
mod controller;
mod output;

pub use buffer::{AudioBuffer, AudioBufferCache, decode_pcm16};
pub use controller::{AudioPlaybackController, AudioSnapshot, AudioStatus};
pub use output::{AudioOutput, EndedCallback, OutputDevice, OutputFactory, OutputSource};
