//! Typed errors for the service layer.
//!
//! Every variant is caught at the orchestrator, reconciler or playback
//! boundary and turned into a `Notice` or an item status.

use thiserror::Error;
use wastewise_core::CoreError;
use wastewise_llm::LlmError;
use wastewise_storage::StorageError;

/// Input rejected before any state is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no image selected")]
    MissingImage,

    #[error("question is empty")]
    EmptyQuery,

    #[error("image is {size} bytes, limit is {limit}")]
    ImageTooLarge { size: usize, limit: usize },

    /// Reanalysis requested but the stored input could not be restored.
    #[error("stored input for reanalysis is missing")]
    MissingReanalysisData,

    #[error("nothing to queue while offline")]
    OfflineNoInput,
}

/// Speech playback failure.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("speech synthesis: {0}")]
    Synthesis(#[from] LlmError),

    #[error("audio decode: {0}")]
    Decode(String),

    #[error("audio output: {0}")]
    Output(String),
}

/// Geolocation or image metadata lookup failure. Never surfaced to the user.
#[derive(Debug, Error)]
#[error("metadata probe: {0}")]
pub struct MetadataError(pub String);

impl From<CoreError> for MetadataError {
    fn from(err: CoreError) -> Self {
        Self(err.to_string())
    }
}

/// Service-layer error unifying validation, remote, storage and audio failures.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation: {0}")]
    Validation(#[from] ValidationError),

    #[error("analysis service: {0}")]
    Llm(#[from] LlmError),

    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    #[error("audio: {0}")]
    Audio(#[from] AudioError),

    #[error("core: {0}")]
    Core(#[from] CoreError),
}

impl ServiceError {
    /// Whether this error is likely transient (worth retrying).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_transient(),
            Self::Llm(e) | Self::Audio(AudioError::Synthesis(e)) => e.is_transient(),
            _ => false,
        }
    }
}
