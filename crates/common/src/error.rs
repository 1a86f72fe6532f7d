//! Error types shared across reeltext crates.

use std::fmt;
use std::path::PathBuf;

/// Top-level error type for reeltext operations.
#[derive(Debug, thiserror::Error)]
pub enum ReeltextError {
    /// The source video could not be loaded or decoded.
    #[error("Resource error: {message}")]
    Resource { message: String },

    /// The runtime lacks something an operation needs. Always carries a hint
    /// telling the user how to recover.
    #[error("Capability error: {message} ({hint})")]
    Capability { message: String, hint: String },

    /// An operation referenced state that no longer exists.
    #[error("State error: {message}")]
    State { message: String },

    /// Degenerate geometry or time windows.
    #[error("Geometry error: {message}")]
    Geometry { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Cancelled: {message}")]
    Cancelled { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ReeltextError.
pub type ReeltextResult<T> = Result<T, ReeltextError>;

/// Coarse classification of an error, used in user-facing failure reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Resource,
    Capability,
    State,
    Geometry,
    Cancelled,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Resource => "ResourceError",
            ErrorCategory::Capability => "CapabilityError",
            ErrorCategory::State => "StateError",
            ErrorCategory::Geometry => "GeometryError",
            ErrorCategory::Cancelled => "Cancelled",
            ErrorCategory::Internal => "InternalError",
        };
        f.write_str(name)
    }
}

impl ReeltextError {
    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource {
            message: msg.into(),
        }
    }

    pub fn capability(msg: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::Capability {
            message: msg.into(),
            hint: hint.into(),
        }
    }

    pub fn state(msg: impl Into<String>) -> Self {
        Self::State {
            message: msg.into(),
        }
    }

    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::Geometry {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled {
            message: msg.into(),
        }
    }

    /// Classify this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Resource { .. } | Self::FileNotFound { .. } => ErrorCategory::Resource,
            Self::Capability { .. } => ErrorCategory::Capability,
            Self::State { .. } => ErrorCategory::State,
            Self::Geometry { .. } => ErrorCategory::Geometry,
            Self::Cancelled { .. } => ErrorCategory::Cancelled,
            Self::Render { .. }
            | Self::Config { .. }
            | Self::Io(_)
            | Self::Json(_)
            | Self::Other(_) => ErrorCategory::Internal,
        }
    }

    /// Remediation hint, if the error carries one.
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::Capability { hint, .. } => Some(hint),
            _ => None,
        }
    }

    /// Stale references are tolerated by callers as no-ops.
    pub fn is_state(&self) -> bool {
        matches!(self, Self::State { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_error_carries_hint() {
        let err = ReeltextError::capability("audio graph not connected", "play the video once");
        assert_eq!(err.category(), ErrorCategory::Capability);
        assert_eq!(err.hint(), Some("play the video once"));
        assert!(err.to_string().contains("play the video once"));
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            ReeltextError::FileNotFound {
                path: PathBuf::from("missing.mp4")
            }
            .category(),
            ErrorCategory::Resource
        );
        assert!(ReeltextError::state("gone").is_state());
        assert_eq!(
            ReeltextError::Io(std::io::Error::other("boom")).category(),
            ErrorCategory::Internal
        );
        assert_eq!(ErrorCategory::Capability.to_string(), "CapabilityError");
    }
}
