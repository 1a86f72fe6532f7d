//! The session audio graph.
//!
//! Recording audio needs a tap on the playing source. The tap can only be
//! created from a user-initiated playback, so the graph connects lazily on
//! the first `play` and stays connected until it is explicitly released.

use std::path::PathBuf;

use reeltext_common::{ReeltextError, ReeltextResult};
use reeltext_overlay_model::source::SourceVideo;

/// A connected audio output that capture streams can read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioTap {
    pub id: u64,
    /// Media file the audio is read from, when the backend reads files.
    pub source: Option<PathBuf>,
    /// Whether the source actually carries audio.
    pub has_audio: bool,
}

/// Platform audio plumbing.
pub trait AudioBackend {
    fn name(&self) -> &str;

    fn connect(&mut self, source: &SourceVideo) -> ReeltextResult<AudioTap>;

    fn disconnect(&mut self, tap: &AudioTap) -> ReeltextResult<()>;
}

/// Owner of the session's audio tap.
pub struct AudioGraph {
    backend: Box<dyn AudioBackend>,
    tap: Option<AudioTap>,
}

impl std::fmt::Debug for AudioGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioGraph")
            .field("backend", &self.backend.name())
            .field("tap", &self.tap)
            .finish()
    }
}

impl AudioGraph {
    pub fn new(backend: Box<dyn AudioBackend>) -> Self {
        Self { backend, tap: None }
    }

    pub fn is_connected(&self) -> bool {
        self.tap.is_some()
    }

    pub fn tap(&self) -> Option<&AudioTap> {
        self.tap.as_ref()
    }

    /// Connect to `source` unless already connected.
    pub fn ensure_connected(&mut self, source: &SourceVideo) -> ReeltextResult<&AudioTap> {
        if self.tap.is_none() {
            let tap = self.backend.connect(source).map_err(|e| {
                ReeltextError::resource(format!("audio graph connect failed: {e}"))
            })?;
            tracing::info!(
                backend = self.backend.name(),
                tap = tap.id,
                has_audio = tap.has_audio,
                "Audio graph connected"
            );
            self.tap = Some(tap);
        }
        self.tap
            .as_ref()
            .ok_or_else(|| ReeltextError::state("audio tap missing after connect"))
    }

    /// Disconnect the tap. Releasing an unconnected graph is a no-op.
    pub fn release(&mut self) -> ReeltextResult<()> {
        if let Some(tap) = self.tap.take() {
            self.backend.disconnect(&tap)?;
            tracing::info!(backend = self.backend.name(), tap = tap.id, "Audio graph released");
        }
        Ok(())
    }
}

impl Drop for AudioGraph {
    fn drop(&mut self) {
        if let Some(tap) = self.tap.take() {
            tracing::warn!(tap = tap.id, "Audio graph dropped while connected; releasing");
            if let Err(e) = self.backend.disconnect(&tap) {
                tracing::warn!(error = %e, "Audio graph release failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Log {
        connects: u32,
        disconnects: u32,
    }

    struct CountingBackend {
        log: Rc<RefCell<Log>>,
    }

    impl AudioBackend for CountingBackend {
        fn name(&self) -> &str {
            "counting"
        }

        fn connect(&mut self, source: &SourceVideo) -> ReeltextResult<AudioTap> {
            let mut log = self.log.borrow_mut();
            log.connects += 1;
            Ok(AudioTap {
                id: log.connects as u64,
                source: Some(source.path.clone()),
                has_audio: source.has_audio,
            })
        }

        fn disconnect(&mut self, _tap: &AudioTap) -> ReeltextResult<()> {
            self.log.borrow_mut().disconnects += 1;
            Ok(())
        }
    }

    fn source() -> SourceVideo {
        SourceVideo {
            path: PathBuf::from("clip.mp4"),
            title: "clip".to_string(),
            duration_secs: 5.0,
            width: 640,
            height: 360,
            frame_rate: 30.0,
            has_audio: true,
        }
    }

    fn graph() -> (AudioGraph, Rc<RefCell<Log>>) {
        let log = Rc::new(RefCell::new(Log::default()));
        let backend = CountingBackend {
            log: Rc::clone(&log),
        };
        (AudioGraph::new(Box::new(backend)), log)
    }

    #[test]
    fn test_connects_once() {
        let (mut graph, log) = graph();
        assert!(!graph.is_connected());
        graph.ensure_connected(&source()).unwrap();
        graph.ensure_connected(&source()).unwrap();
        assert_eq!(log.borrow().connects, 1);
        assert!(graph.is_connected());
    }

    #[test]
    fn test_release_disconnects_and_allows_reconnect() {
        let (mut graph, log) = graph();
        graph.ensure_connected(&source()).unwrap();
        graph.release().unwrap();
        graph.release().unwrap();
        assert_eq!(log.borrow().disconnects, 1);
        assert!(graph.tap().is_none());
        let tap = graph.ensure_connected(&source()).unwrap();
        assert_eq!(tap.id, 2);
    }

    #[test]
    fn test_drop_releases_connected_graph() {
        let (mut graph, log) = graph();
        graph.ensure_connected(&source()).unwrap();
        drop(graph);
        assert_eq!(log.borrow().disconnects, 1);
    }
}
