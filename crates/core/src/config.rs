//! Runtime settings read from the environment.

use std::path::PathBuf;

use crate::constants::{
    DEFAULT_API_URL, DEFAULT_GEOLOCATION_TIMEOUT_MS, DEFAULT_MAX_IMAGE_BYTES, DEFAULT_MODEL,
    DEFAULT_TTS_MODEL, DEFAULT_TTS_VOICE,
};
use crate::env_config::env_parse_with_default;

/// Settings shared by every layer of the client.
#[derive(Clone)]
pub struct Settings {
    /// Credential for the analysis service. `None` when unset.
    pub api_key: Option<String>,
    /// Base URL of the OpenAI-compatible analysis endpoint.
    pub api_url: String,
    pub model: String,
    pub tts_model: String,
    pub tts_voice: String,
    /// SQLite file backing the persistent store.
    pub db_path: PathBuf,
    pub max_image_bytes: usize,
    pub geolocation_timeout_ms: u64,
    pub http_timeout_secs: u64,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("tts_model", &self.tts_model)
            .field("tts_voice", &self.tts_voice)
            .field("db_path", &self.db_path)
            .field("max_image_bytes", &self.max_image_bytes)
            .field("geolocation_timeout_ms", &self.geolocation_timeout_ms)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .finish()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_API_URL.to_owned(),
            model: DEFAULT_MODEL.to_owned(),
            tts_model: DEFAULT_TTS_MODEL.to_owned(),
            tts_voice: DEFAULT_TTS_VOICE.to_owned(),
            db_path: default_db_path(),
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            geolocation_timeout_ms: DEFAULT_GEOLOCATION_TIMEOUT_MS,
            http_timeout_secs: 60,
        }
    }
}

impl Settings {
    /// Reads `WASTEWISE_*` variables, keeping defaults for anything unset.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: non_empty_var("WASTEWISE_API_KEY"),
            api_url: non_empty_var("WASTEWISE_API_URL").unwrap_or(defaults.api_url),
            model: non_empty_var("WASTEWISE_MODEL").unwrap_or(defaults.model),
            tts_model: non_empty_var("WASTEWISE_TTS_MODEL").unwrap_or(defaults.tts_model),
            tts_voice: non_empty_var("WASTEWISE_TTS_VOICE").unwrap_or(defaults.tts_voice),
            db_path: non_empty_var("WASTEWISE_DB_PATH").map_or(defaults.db_path, PathBuf::from),
            max_image_bytes: env_parse_with_default(
                "WASTEWISE_MAX_IMAGE_BYTES",
                defaults.max_image_bytes,
            ),
            geolocation_timeout_ms: env_parse_with_default(
                "WASTEWISE_GEOLOCATION_TIMEOUT_MS",
                defaults.geolocation_timeout_ms,
            ),
            http_timeout_secs: env_parse_with_default(
                "WASTEWISE_HTTP_TIMEOUT_SECS",
                defaults.http_timeout_secs,
            ),
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    #[must_use]
    pub fn with_db_path(mut self, db_path: impl Into<PathBuf>) -> Self {
        self.db_path = db_path.into();
        self
    }
}

fn non_empty_var(var: &str) -> Option<String> {
    std::env::var(var).ok().map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wastewise")
        .join("wastewise.db")
}
