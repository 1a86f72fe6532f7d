//! Errors raised by the overlay model.

use reeltext_common::error::ReeltextError;

use crate::overlay::OverlayId;

/// Errors that can occur when editing overlays.
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error("overlay {id} does not exist")]
    NotFound { id: OverlayId },

    #[error("invalid time window [{start_secs}, {end_secs})")]
    InvalidWindow { start_secs: f64, end_secs: f64 },

    #[error("animation duration must be positive, got {secs}")]
    InvalidAnimationDuration { secs: f64 },

    #[error("invalid color {value:?}")]
    InvalidColor { value: String },

    #[error("invalid style: {message}")]
    InvalidStyle { message: String },

    #[error("failed to parse edit commands: {source}")]
    Parse {
        #[from]
        source: serde_json::Error,
    },
}

impl From<OverlayError> for ReeltextError {
    fn from(err: OverlayError) -> Self {
        match err {
            OverlayError::NotFound { .. } => ReeltextError::state(err.to_string()),
            OverlayError::InvalidWindow { .. } | OverlayError::InvalidAnimationDuration { .. } => {
                ReeltextError::geometry(err.to_string())
            }
            OverlayError::InvalidColor { .. } | OverlayError::InvalidStyle { .. } => {
                ReeltextError::config(err.to_string())
            }
            OverlayError::Parse { source } => ReeltextError::Json(source),
        }
    }
}
