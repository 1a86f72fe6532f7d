//! Edit commands emitted by a property-editing UI.
//!
//! A command stream is JSON, one array of `op`-tagged objects:
//!
//! ```json
//! [
//!   {"op": "add", "at_secs": 2.0, "patch": {"text": "Hello", "end_secs": 5.0, "animation": "fade-in"}},
//!   {"op": "update", "id": 1, "patch": {"position": {"x": 50, "y": 80}}},
//!   {"op": "select", "id": null}
//! ]
//! ```

use serde::{Deserialize, Serialize};

use crate::error::OverlayError;
use crate::overlay::{OverlayId, OverlayPatch};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EditCommand {
    /// Create an overlay at the given playback time, then apply `patch`.
    Add {
        at_secs: f64,
        #[serde(default)]
        patch: OverlayPatch,
    },
    Update {
        id: OverlayId,
        patch: OverlayPatch,
    },
    Remove {
        id: OverlayId,
    },
    Select {
        id: Option<OverlayId>,
    },
}

/// Parse a JSON command stream.
pub fn parse_commands(json: &str) -> Result<Vec<EditCommand>, OverlayError> {
    Ok(serde_json::from_str(json)?)
}
