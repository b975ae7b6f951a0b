//! Best-effort location sources: device geolocation and image metadata.
//!
//! Both are one-shot and fail open. A probe that errors or runs past its
//! deadline simply yields no location.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use wastewise_core::Location;

use crate::error::MetadataError;

/// Current device position.
#[async_trait]
pub trait LocationProbe: Send + Sync {
    async fn current_location(&self) -> Result<Option<Location>, MetadataError>;
}

/// GPS coordinates embedded in an image (EXIF or similar).
///
/// Implementations typically read the GPS tags and convert them with
/// `Location::from_exif`.
#[async_trait]
pub trait MetadataProbe: Send + Sync {
    async fn gps_location(&self, image: &[u8], media_type: &str) -> Result<Option<Location>, MetadataError>;
}

/// Probe for environments without geolocation or metadata support.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLocation;

#[async_trait]
impl LocationProbe for NoLocation {
    async fn current_location(&self) -> Result<Option<Location>, MetadataError> {
        Ok(None)
    }
}

#[async_trait]
impl MetadataProbe for NoLocation {
    async fn gps_location(&self, _image: &[u8], _media_type: &str) -> Result<Option<Location>, MetadataError> {
        Ok(None)
    }
}

/// Runs `probe` with a deadline, turning errors and timeouts into `None`.
pub(crate) async fn bounded<F>(what: &'static str, deadline: Duration, probe: F) -> Option<Location>
where
    F: Future<Output = Result<Option<Location>, MetadataError>>,
{
    match tokio::time::timeout(deadline, probe).await {
        Ok(Ok(location)) => location,
        Ok(Err(e)) => {
            tracing::warn!(probe = what, error = %e, "Location probe failed");
            None
        },
        Err(_) => {
            tracing::warn!(probe = what, ?deadline, "Location probe timed out");
            None
        },
    }
}
