//! Audio taps backed by the source file itself.
//!
//! ffmpeg cannot listen to a playing element, so a tap simply names the
//! media file; the recorder muxes the source's audio stream alongside the
//! captured frames.

use std::collections::BTreeSet;

use reeltext_common::{ReeltextError, ReeltextResult};
use reeltext_overlay_model::source::SourceVideo;
use reeltext_render_engine::audio::{AudioBackend, AudioTap};

#[derive(Debug, Default)]
pub struct FfmpegAudioBackend {
    next_id: u64,
    live: BTreeSet<u64>,
}

impl FfmpegAudioBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Taps connected and not yet released.
    pub fn live_taps(&self) -> usize {
        self.live.len()
    }
}

impl AudioBackend for FfmpegAudioBackend {
    fn name(&self) -> &str {
        "ffmpeg-file"
    }

    fn connect(&mut self, source: &SourceVideo) -> ReeltextResult<AudioTap> {
        self.next_id += 1;
        let id = self.next_id;
        self.live.insert(id);
        if !source.has_audio {
            tracing::debug!(path = %source.path.display(), "Source has no audio stream; tap is silent");
        }
        Ok(AudioTap {
            id,
            source: Some(source.path.clone()),
            has_audio: source.has_audio,
        })
    }

    fn disconnect(&mut self, tap: &AudioTap) -> ReeltextResult<()> {
        if self.live.remove(&tap.id) {
            Ok(())
        } else {
            Err(ReeltextError::state(format!("audio tap {} is not connected", tap.id)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reeltext_render_engine::audio::AudioGraph;
    use std::path::PathBuf;

    fn source(has_audio: bool) -> SourceVideo {
        SourceVideo {
            path: PathBuf::from("/videos/trip.mp4"),
            title: "trip".to_string(),
            duration_secs: 5.0,
            width: 640,
            height: 360,
            frame_rate: 30.0,
            has_audio,
        }
    }

    #[test]
    fn test_connect_names_source_file() {
        let mut backend = FfmpegAudioBackend::new();
        let tap = backend.connect(&source(true)).unwrap();
        assert_eq!(tap.source.as_deref(), Some(PathBuf::from("/videos/trip.mp4").as_path()));
        assert!(tap.has_audio);
        assert_eq!(backend.live_taps(), 1);
    }

    #[test]
    fn test_double_disconnect_is_state_error() {
        let mut backend = FfmpegAudioBackend::new();
        let tap = backend.connect(&source(false)).unwrap();
        backend.disconnect(&tap).unwrap();
        let err = backend.disconnect(&tap).unwrap_err();
        assert!(err.is_state());
    }

    #[test]
    fn test_graph_connects_once() {
        let mut graph = AudioGraph::new(Box::new(FfmpegAudioBackend::new()));
        let first = graph.ensure_connected(&source(true)).unwrap().id;
        let second = graph.ensure_connected(&source(true)).unwrap().id;
        assert_eq!(first, second);
        graph.release().unwrap();
        assert!(!graph.is_connected());
    }
}
