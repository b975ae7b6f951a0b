//! Shared constants for wastewise.

/// Persistent-store key holding the full ordered history sequence.
pub const HISTORY_STORAGE_KEY: &str = "analysisHistory";

/// Largest image accepted for analysis (4 MiB).
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 4 * 1024 * 1024;

/// Upper bound on a one-shot geolocation lookup.
pub const DEFAULT_GEOLOCATION_TIMEOUT_MS: u64 = 5000;

/// Sample rate of synthesized speech (16-bit PCM).
pub const SPEECH_SAMPLE_RATE: u32 = 24_000;

/// Channel count of synthesized speech.
pub const SPEECH_CHANNELS: u16 = 1;

/// Default analysis model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default speech synthesis model.
pub const DEFAULT_TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";

/// Default speech voice.
pub const DEFAULT_TTS_VOICE: &str = "Kore";

/// Default OpenAI-compatible endpoint of the analysis service.
pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
