use std::sync::{Arc, Mutex, PoisonError};

use super::buffer::AudioBuffer;
use crate::error::AudioError;

/// Invoked once when a source plays to the end of its buffer.
pub type EndedCallback = Box<dyn FnOnce() + Send + 'static>;

/// Builds the platform output on first use.
pub type OutputFactory = Box<dyn Fn() -> Result<Arc<dyn AudioOutput>, AudioError> + Send + Sync>;

/// A playback context: a clock plus the ability to start buffer sources.
pub trait AudioOutput: Send + Sync {
    /// Output clock in seconds.
    fn current_time(&self) -> f64;

    /// Wakes a context the platform suspended (e.g. before a user gesture).
    fn resume_if_suspended(&self) -> Result<(), AudioError>;

    /// Starts `buffer` at `offset` seconds.
    ///
    /// `on_ended` fires when the buffer plays out, and may also fire after
    /// `stop`. It must not be invoked from inside `start` itself.
    fn start(
        &self,
        buffer: Arc<AudioBuffer>,
        offset: f64,
        on_ended: EndedCallback,
    ) -> Result<Box<dyn OutputSource>, AudioError>;
}

/// One connected buffer source.
pub trait OutputSource: Send {
    fn stop(&mut self);
    fn disconnect(&mut self);
}

/// Lazily acquired handle to the single output device.
pub struct OutputDevice {
    factory: OutputFactory,
    output: Mutex<Option<Arc<dyn AudioOutput>>>,
}

impl std::fmt::Debug for OutputDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputDevice").field("acquired", &self.is_acquired()).finish_non_exhaustive()
    }
}

impl OutputDevice {
    #[must_use]
    pub fn new(factory: OutputFactory) -> Self {
        Self { factory, output: Mutex::new(None) }
    }

    /// Returns the device, creating it on first call.
    ///
    /// # Errors
    /// Returns the factory's error; the next call tries again.
    pub fn acquire(&self) -> Result<Arc<dyn AudioOutput>, AudioError> {
        let mut output = self.output.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = output.as_ref() {
            return Ok(Arc::clone(existing));
        }
        let created = (self.factory)()?;
        tracing::debug!("Audio output acquired");
        *output = Some(Arc::clone(&created));
        Ok(created)
    }

    #[must_use]
    pub fn is_acquired(&self) -> bool {
        self.output.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }
}
