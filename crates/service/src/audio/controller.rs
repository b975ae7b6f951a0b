//! Playback state machine for synthesized speech, one live session at most.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use wastewise_llm::{AnalysisService, PromptConfig};

use super::buffer::{AudioBuffer, AudioBufferCache};
use super::output::{OutputDevice, OutputFactory, OutputSource};
use crate::error::AudioError;
use crate::notice::{Notice, NoticeKind, Notifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioStatus {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
    Error,
}

impl AudioStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match *self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Error => "error",
        }
    }
}

/// Observable session state.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSnapshot {
    pub item_id: Option<String>,
    pub status: AudioStatus,
    /// Accumulated playback offset as of the last pause, in seconds.
    pub offset_secs: f64,
}

#[derive(Default)]
struct Session {
    item_id: Option<String>,
    status: AudioStatus,
    offset: f64,
    started_at: f64,
    source: Option<Box<dyn OutputSource>>,
    token: u64,
    generation: u64,
}

struct Shared {
    llm: Arc<dyn AnalysisService>,
    prompt: PromptConfig,
    buffers: AudioBufferCache,
    device: OutputDevice,
    notifier: Notifier,
    session: Mutex<Session>,
    /// Token of the only source whose completion callback may still act.
    live_token: AtomicU64,
}

/// Owns the speech buffers, the output device and the playback session.
///
/// Starting a source always stops and disconnects the previous one first, and
/// invalidates its completion callback before doing so.
pub struct AudioPlaybackController {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for AudioPlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioPlaybackController").field("state", &self.snapshot()).finish_non_exhaustive()
    }
}

impl AudioPlaybackController {
    #[must_use]
    pub fn new(
        llm: Arc<dyn AnalysisService>,
        prompt: PromptConfig,
        output: OutputFactory,
        notifier: Notifier,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                llm,
                prompt,
                buffers: AudioBufferCache::new(),
                device: OutputDevice::new(output),
                notifier,
                session: Mutex::new(Session::default()),
                live_token: AtomicU64::new(0),
            }),
        }
    }

    /// Play, pause or resume speech for `item_id`.
    ///
    /// Toggling a different item stops the current one first. The first play
    /// of an item synthesizes `text`; later plays reuse the decoded buffer.
    /// Toggling an item that is still loading does nothing.
    ///
    /// # Errors
    /// Returns the synthesis, decode or output failure after notifying it; the
    /// controller is then in `Error` until acknowledged or toggled again.
    pub async fn toggle(&self, item_id: &str, text: &str) -> Result<AudioStatus, AudioError> {
        let shared = &self.shared;
        let generation = {
            let mut session = shared.session();
            if session.status == AudioStatus::Error {
                session.status = AudioStatus::Idle;
            }
            let same_item = session.item_id.as_deref() == Some(item_id);
            match session.status {
                AudioStatus::Playing if same_item => {
                    shared.pause(&mut session);
                    return Ok(AudioStatus::Paused);
                },
                AudioStatus::Loading if same_item => return Ok(AudioStatus::Loading),
                AudioStatus::Paused if same_item => {
                    if let Some(buffer) = shared.buffers.get(item_id) {
                        let offset = session.offset;
                        return shared.play(&mut session, item_id, buffer, offset);
                    }
                    tracing::debug!(item_id, "Paused item has no buffer, synthesizing again");
                    shared.reset(&mut session);
                },
                AudioStatus::Idle | AudioStatus::Error => {},
                AudioStatus::Playing | AudioStatus::Loading | AudioStatus::Paused => {
                    tracing::debug!(from = ?session.item_id, to = item_id, "Switching playback item");
                    shared.reset(&mut session);
                },
            }

            if let Some(buffer) = shared.buffers.get(item_id) {
                return shared.play(&mut session, item_id, buffer, 0.0);
            }
            session.generation += 1;
            session.item_id = Some(item_id.to_owned());
            session.status = AudioStatus::Loading;
            session.offset = 0.0;
            session.generation
        };

        tracing::info!(item_id, "Synthesizing speech");
        let decoded = match shared.llm.generate_speech(text, &shared.prompt).await {
            Ok(pcm) => AudioBuffer::from_pcm16(&pcm),
            Err(e) => Err(AudioError::Synthesis(e)),
        };

        let mut session = shared.session();
        let still_current = session.generation == generation
            && session.status == AudioStatus::Loading
            && session.item_id.as_deref() == Some(item_id);
        match decoded {
            Ok(buffer) => {
                let buffer = shared.buffers.insert(item_id, buffer);
                if !still_current {
                    tracing::debug!(item_id, "Speech ready for a superseded session");
                    return Ok(AudioStatus::Idle);
                }
                shared.play(&mut session, item_id, buffer, 0.0)
            },
            Err(e) if !still_current => {
                tracing::warn!(item_id, error = %e, "Speech failed for a superseded session");
                Ok(AudioStatus::Idle)
            },
            Err(e) => Err(shared.fail(&mut session, e)),
        }
    }

    /// Stops any playback and returns to `Idle`.
    pub fn stop(&self) {
        let mut session = self.shared.session();
        if session.status != AudioStatus::Idle {
            tracing::debug!(item_id = ?session.item_id, "Playback stopped");
        }
        self.shared.reset(&mut session);
    }

    /// Leaves the `Error` state.
    pub fn acknowledge_error(&self) {
        let mut session = self.shared.session();
        if session.status == AudioStatus::Error {
            session.status = AudioStatus::Idle;
        }
    }

    #[must_use]
    pub fn status(&self) -> AudioStatus {
        self.shared.session().status
    }

    #[must_use]
    pub fn snapshot(&self) -> AudioSnapshot {
        let session = self.shared.session();
        AudioSnapshot {
            item_id: session.item_id.clone(),
            status: session.status,
            offset_secs: session.offset,
        }
    }

    /// Number of items with a decoded buffer.
    #[must_use]
    pub fn cached_buffers(&self) -> usize {
        self.shared.buffers.len()
    }
}

impl Shared {
    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release_source(&self, session: &mut Session) {
        self.live_token.fetch_add(1, Ordering::SeqCst);
        if let Some(mut source) = session.source.take() {
            source.stop();
            source.disconnect();
        }
    }

    fn reset(&self, session: &mut Session) {
        self.release_source(session);
        session.item_id = None;
        session.status = AudioStatus::Idle;
        session.offset = 0.0;
        session.started_at = 0.0;
    }

    fn pause(&self, session: &mut Session) {
        if let Ok(output) = self.device.acquire() {
            session.offset += (output.current_time() - session.started_at).max(0.0);
        }
        self.release_source(session);
        session.status = AudioStatus::Paused;
        tracing::info!(item_id = ?session.item_id, offset = session.offset, "Playback paused");
    }

    fn play(
        self: &Arc<Self>,
        session: &mut Session,
        item_id: &str,
        buffer: Arc<AudioBuffer>,
        offset: f64,
    ) -> Result<AudioStatus, AudioError> {
        match self.start_source(session, item_id, buffer, offset) {
            Ok(()) => Ok(AudioStatus::Playing),
            Err(e) => Err(self.fail(session, e)),
        }
    }

    fn start_source(
        self: &Arc<Self>,
        session: &mut Session,
        item_id: &str,
        buffer: Arc<AudioBuffer>,
        offset: f64,
    ) -> Result<(), AudioError> {
        let duration = buffer.duration_secs();
        if duration <= 0.0 {
            return Err(AudioError::Decode("speech buffer is empty".to_owned()));
        }
        self.release_source(session);

        let output = self.device.acquire()?;
        output.resume_if_suspended()?;
        let start_at = offset.rem_euclid(duration);
        let token = self.live_token.fetch_add(1, Ordering::SeqCst) + 1;
        let weak: Weak<Self> = Arc::downgrade(self);
        let ended_item = item_id.to_owned();
        let now = output.current_time();
        let source = output.start(
            buffer,
            start_at,
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.on_ended(token, &ended_item);
                }
            }),
        )?;

        session.source = Some(source);
        session.token = token;
        session.item_id = Some(item_id.to_owned());
        session.status = AudioStatus::Playing;
        session.offset = offset;
        session.started_at = now;
        tracing::info!(item_id, start_at, duration, "Playback started");
        Ok(())
    }

    fn on_ended(&self, token: u64, item_id: &str) {
        if self.live_token.load(Ordering::SeqCst) != token {
            return;
        }
        let mut session = self.session();
        if session.token != token
            || session.status != AudioStatus::Playing
            || session.item_id.as_deref() != Some(item_id)
        {
            return;
        }
        self.live_token.fetch_add(1, Ordering::SeqCst);
        if let Some(mut source) = session.source.take() {
            source.disconnect();
        }
        session.item_id = None;
        session.status = AudioStatus::Idle;
        session.offset = 0.0;
        session.started_at = 0.0;
        tracing::info!(item_id, "Playback finished");
    }

    fn fail(&self, session: &mut Session, err: AudioError) -> AudioError {
        tracing::error!(item_id = ?session.item_id, error = %err, "Speech playback failed");
        self.reset(session);
        session.status = AudioStatus::Error;
        self.notifier.notify(Notice::with_message(NoticeKind::AudioFailed, format!("{}: {err}", self.prompt.error)));
        err
    }
}
