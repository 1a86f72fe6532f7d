//! Compute the draw rectangle of a video inside a container.

use reeltext_overlay_model::layout::DrawRect;

use super::parse_size;

pub fn run(container: &str, video: &str) -> anyhow::Result<()> {
    let rect = DrawRect::contain(parse_size(container)?, parse_size(video)?);
    println!("{}", serde_json::to_string_pretty(&rect)?);
    Ok(())
}
