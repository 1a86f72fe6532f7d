//! Font lookup for the raster surface.
//!
//! Families resolve through the configured font map first, then the
//! configured default font, then a list of well-known system font files.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use fontdue::{Font, FontSettings};
use reeltext_common::config::RenderSettings;
use reeltext_common::{ReeltextError, ReeltextResult};

const SANS_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

const SERIF_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSerif.ttf",
    "/usr/share/fonts/TTF/DejaVuSerif.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSerif-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Times New Roman.ttf",
    "C:\\Windows\\Fonts\\times.ttf",
];

const MONO_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/TTF/DejaVuSansMono.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationMono-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Courier New.ttf",
    "C:\\Windows\\Fonts\\cour.ttf",
];

/// Lazily loaded fonts keyed by family name.
#[derive(Default)]
pub struct FontBook {
    families: BTreeMap<String, PathBuf>,
    default_font: Option<PathBuf>,
    loaded: HashMap<PathBuf, Rc<Font>>,
}

impl std::fmt::Debug for FontBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontBook")
            .field("families", &self.families)
            .field("default_font", &self.default_font)
            .field("loaded", &self.loaded.len())
            .finish()
    }
}

impl FontBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &RenderSettings) -> Self {
        let mut book = Self::new();
        for (family, path) in &settings.fonts {
            book.register(family, path);
        }
        book.default_font = settings.default_font.clone();
        book
    }

    /// Map a family name to a font file. Names are case-insensitive.
    pub fn register(&mut self, family: &str, path: impl Into<PathBuf>) {
        self.families
            .insert(family.trim().to_ascii_lowercase(), path.into());
    }

    /// The file a family would load from, without loading it.
    pub fn resolve_path(&self, family: &str) -> Option<PathBuf> {
        let key = family.trim().to_ascii_lowercase();
        if let Some(path) = self.families.get(&key) {
            return Some(path.clone());
        }
        if let Some(path) = &self.default_font {
            return Some(path.clone());
        }
        system_candidates(&key)
            .iter()
            .map(Path::new)
            .find(|p| p.is_file())
            .map(Path::to_path_buf)
    }

    /// Load the font for a family, caching by file.
    pub fn resolve(&mut self, family: &str) -> ReeltextResult<Rc<Font>> {
        let path = self.resolve_path(family).ok_or_else(|| {
            ReeltextError::render(format!(
                "no font file found for family '{family}'; configure render.fonts or render.default_font"
            ))
        })?;

        if let Some(font) = self.loaded.get(&path) {
            return Ok(Rc::clone(font));
        }

        let data = std::fs::read(&path).map_err(|e| {
            ReeltextError::render(format!("failed to read font {}: {e}", path.display()))
        })?;
        let font = Font::from_bytes(data, FontSettings::default()).map_err(|e| {
            ReeltextError::render(format!("failed to parse font {}: {e}", path.display()))
        })?;
        tracing::debug!(family, path = %path.display(), "Loaded font");

        let font = Rc::new(font);
        self.loaded.insert(path, Rc::clone(&font));
        Ok(font)
    }
}

fn system_candidates(family: &str) -> &'static [&'static str] {
    match family {
        "serif" | "times" | "times new roman" | "georgia" => SERIF_CANDIDATES,
        "monospace" | "courier" | "courier new" => MONO_CANDIDATES,
        _ => SANS_CANDIDATES,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_family_wins_over_default() {
        let mut book = FontBook::new();
        book.default_font = Some(PathBuf::from("/fonts/default.ttf"));
        book.register("Brand Sans", "/fonts/brand.ttf");
        assert_eq!(
            book.resolve_path("brand sans"),
            Some(PathBuf::from("/fonts/brand.ttf"))
        );
        assert_eq!(
            book.resolve_path("Other"),
            Some(PathBuf::from("/fonts/default.ttf"))
        );
    }

    #[test]
    fn test_unreadable_font_is_render_error() {
        let mut book = FontBook::new();
        book.register("ghost", "/definitely/not/here.ttf");
        let err = book.resolve("ghost").unwrap_err();
        assert!(matches!(err, ReeltextError::Render { .. }));
    }

    #[test]
    fn test_generic_families_pick_candidate_lists() {
        assert_eq!(system_candidates("serif"), SERIF_CANDIDATES);
        assert_eq!(system_candidates("monospace"), MONO_CANDIDATES);
        assert_eq!(system_candidates("sans-serif"), SANS_CANDIDATES);
    }
}
