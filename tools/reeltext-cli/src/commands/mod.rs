//! Subcommand implementations and the helpers they share.

use std::path::Path;

use anyhow::Context;
use reeltext_common::config::AppConfig;
use reeltext_common::ReeltextResult;
use reeltext_overlay_model::command::{parse_commands, EditCommand};
use reeltext_overlay_model::layout::Size;
use reeltext_overlay_model::overlay::OverlayId;

pub mod check;
pub mod export;
pub mod frame;
pub mod layout;
pub mod probe;

/// Strict load from an explicit path; otherwise the lenient user config.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AppConfig::load(),
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Parse `WIDTHxHEIGHT`.
pub fn parse_size(value: &str) -> anyhow::Result<Size> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .with_context(|| format!("Expected WIDTHxHEIGHT, got '{value}'"))?;
    let width: f64 = w.trim().parse().with_context(|| format!("Bad width in '{value}'"))?;
    let height: f64 = h.trim().parse().with_context(|| format!("Bad height in '{value}'"))?;
    if !(width.is_finite() && height.is_finite()) || width < 0.0 || height < 0.0 {
        anyhow::bail!("Size must be non-negative: '{value}'");
    }
    Ok(Size::new(width, height))
}

pub fn load_edits(path: Option<&Path>) -> anyhow::Result<Vec<EditCommand>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read edits {}", path.display()))?;
    parse_commands(&json).with_context(|| format!("Failed to parse edits {}", path.display()))
}

/// Run `edits` through `apply` in order. Returns how many were skipped.
///
/// An edit naming an overlay that no longer exists changes nothing and is
/// skipped with a warning; any other rejection aborts.
pub fn apply_edits<F>(edits: &[EditCommand], mut apply: F) -> anyhow::Result<usize>
where
    F: FnMut(&EditCommand) -> ReeltextResult<Option<OverlayId>>,
{
    let mut skipped = 0;
    for (index, command) in edits.iter().enumerate() {
        match apply(command) {
            Ok(_) => {}
            Err(e) if e.is_state() => {
                tracing::warn!(edit = index, error = %e, "Skipping edit");
                skipped += 1;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Edit {index} ({command:?}) rejected"));
            }
        }
    }
    Ok(skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reeltext_common::config::EditorDefaults;
    use reeltext_common::ReeltextError;
    use reeltext_overlay_model::store::OverlayStore;

    fn apply_to(store: &mut OverlayStore, json: &str) -> anyhow::Result<usize> {
        let edits = parse_commands(json).unwrap();
        apply_edits(&edits, |c| store.apply(c).map_err(ReeltextError::from))
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1280x720").unwrap(), Size::new(1280.0, 720.0));
        assert_eq!(parse_size("400X400").unwrap(), Size::new(400.0, 400.0));
        assert!(parse_size("1280").is_err());
        assert!(parse_size("-1x5").is_err());
        assert!(parse_size("ax5").is_err());
    }

    #[test]
    fn test_load_edits() {
        assert!(load_edits(None).unwrap().is_empty());

        let path = std::env::temp_dir().join(format!("reeltext-edits-{}.json", std::process::id()));
        std::fs::write(&path, r#"[{"op": "add", "at_secs": 1.0}]"#).unwrap();
        assert_eq!(load_edits(Some(&path)).unwrap().len(), 1);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_edit_on_removed_overlay_is_skipped() {
        let mut store = OverlayStore::new(EditorDefaults::default()).with_duration(10.0);
        let skipped = apply_to(
            &mut store,
            r#"[
                {"op": "add", "at_secs": 1.0},
                {"op": "add", "at_secs": 2.0},
                {"op": "remove", "id": 1},
                {"op": "update", "id": 1, "patch": {"text": "late"}},
                {"op": "update", "id": 2, "patch": {"text": "kept"}}
            ]"#,
        )
        .unwrap();

        assert_eq!(skipped, 1);
        let texts: Vec<_> = store.iter().map(|o| o.text.as_str()).collect();
        assert_eq!(texts, vec!["kept"]);
    }

    #[test]
    fn test_invalid_edit_still_aborts() {
        let mut store = OverlayStore::new(EditorDefaults::default()).with_duration(10.0);
        let err = apply_to(
            &mut store,
            r#"[
                {"op": "add", "at_secs": 1.0},
                {"op": "update", "id": 1, "patch": {"start_secs": 4.0, "end_secs": 2.0}}
            ]"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Edit 1"));
        assert_eq!(store.len(), 1);
    }
}
