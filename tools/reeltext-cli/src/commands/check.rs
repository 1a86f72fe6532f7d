//! Check system capabilities.

use reeltext_common::config::AppConfig;
use reeltext_media_engine::{ffmpeg_available, ffprobe_available};
use reeltext_render_engine::fonts::FontBook;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("reeltext System Check");
    println!("{}", "=".repeat(50));

    let ffmpeg = ffmpeg_available();
    let ffprobe = ffprobe_available();
    report(ffmpeg, "ffmpeg", "playback, frame decoding, and export");
    report(ffprobe, "ffprobe", "reading video metadata");

    let fonts = FontBook::from_settings(&config.render);
    let family = &config.editor.font_family;
    let font = fonts.resolve_path(family);
    match &font {
        Some(path) => println!("[OK] Font for '{family}': {}", path.display()),
        None => println!(
            "[WARN] No font found for '{family}'. Set render.default_font in the config."
        ),
    }

    println!();
    println!("  Export container: {}", config.export.mime_type);
    println!(
        "  Render loop: {} fps, capture: {} fps",
        config.render.fps, config.export.capture_fps
    );

    println!();
    if ffmpeg && ffprobe && font.is_some() {
        println!("All required capabilities are available. reeltext is ready.");
    } else {
        println!("Some required capabilities are missing. See above for fixes.");
    }

    Ok(())
}

fn report(available: bool, name: &str, purpose: &str) {
    if available {
        println!("[OK] {name} found ({purpose})");
    } else {
        println!("[MISSING] {name}: needed for {purpose}. Install ffmpeg and add it to PATH.");
    }
}
