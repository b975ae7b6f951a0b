//! Geographic coordinates and EXIF GPS conversion.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Decimal-degree coordinates attached to an image request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

impl Location {
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Builds a location from EXIF GPS tag descriptions.
    ///
    /// # Errors
    /// Returns `CoreError::InvalidCoordinate` if either coordinate is malformed.
    pub fn from_exif(lat_dms: &str, lat_ref: &str, lon_dms: &str, lon_ref: &str) -> Result<Self> {
        Ok(Self { lat: dms_to_decimal(lat_dms, lat_ref)?, lon: dms_to_decimal(lon_dms, lon_ref)? })
    }
}

/// Converts an EXIF "degrees, minutes, seconds" description to decimal degrees.
///
/// Southern and western references yield negative values.
///
/// # Errors
/// Returns `CoreError::InvalidCoordinate` when a component is missing or not a number.
pub fn dms_to_decimal(dms: &str, reference: &str) -> Result<f64> {
    let parts = dms
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| CoreError::InvalidCoordinate(format!("{dms:?}: {e}")))?;
    let [degrees, minutes, seconds] = parts[..] else {
        return Err(CoreError::InvalidCoordinate(format!("{dms:?}: expected 3 components")));
    };
    let decimal = degrees + minutes / 60.0 + seconds / 3600.0;
    match reference.trim() {
        "S" | "W" => Ok(-decimal),
        _ => Ok(decimal),
    }
}
