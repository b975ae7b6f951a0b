//! Self-contained `data:` URLs used as stored image previews.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::error::{CoreError, Result};

/// A decoded `data:<mime>;base64,<payload>` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl DataUrl {
    /// Encodes raw bytes as a base64 data URL.
    #[must_use]
    pub fn encode(media_type: &str, bytes: &[u8]) -> String {
        format!("data:{media_type};base64,{}", STANDARD.encode(bytes))
    }

    /// Parses a base64 data URL.
    ///
    /// # Errors
    /// Returns `CoreError::InvalidDataUrl` if the scheme, header or payload is malformed.
    pub fn parse(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| CoreError::InvalidDataUrl("missing data: scheme".to_owned()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| CoreError::InvalidDataUrl("missing payload separator".to_owned()))?;
        let media_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| CoreError::InvalidDataUrl("payload is not base64".to_owned()))?;
        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| CoreError::InvalidDataUrl(format!("bad base64 payload: {e}")))?;
        Ok(Self { media_type: media_type.to_owned(), bytes })
    }
}
