//! Print probed video metadata.

use std::path::PathBuf;

use reeltext_media_engine::probe_video;

pub fn run(video: PathBuf) -> anyhow::Result<()> {
    let source = probe_video(&video)
        .map_err(|e| anyhow::anyhow!("Failed to probe {}: {e}", video.display()))?;
    println!("{}", serde_json::to_string_pretty(&source)?);
    Ok(())
}
