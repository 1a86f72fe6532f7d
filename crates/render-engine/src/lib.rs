//! reeltext Render Engine
//!
//! Live compositing of timed text overlays on a playing video, plus
//! real-time export of the composited result.
//!
//! # Frame Pipeline
//!
//! ```text
//! MediaPlayer ──frame──┐
//!                      ├── FrameRenderer ──► Surface ──snapshot──► Recorder ──chunks──► Artifact
//! OverlayStore ────────┘        ▲                                      ▲
//!                               │                                      │
//!                       animation::evaluate                      AudioGraph tap
//! ```
//!
//! A single [`render_loop::RenderLoop`] ticks the [`session::EditorSession`];
//! exporting reuses the same tick to feed the recorder.

pub mod animation;
pub mod audio;
pub mod compositor;
pub mod display_list;
pub mod export;
pub mod fonts;
pub mod interaction;
pub mod media;
pub mod raster;
pub mod render_loop;
pub mod session;
pub mod surface;

pub use animation::{evaluate, AnimationState, FrameTime, TickerPath, Transform};
pub use audio::{AudioBackend, AudioGraph, AudioTap};
pub use compositor::{FrameInput, FrameRenderer, FrameStats, RenderOptions};
pub use display_list::{DisplayList, DrawCommand};
pub use export::*;
pub use fonts::FontBook;
pub use interaction::{DragController, SurfaceBounds};
pub use media::{Artifact, DownloadSink, MediaPlayer, PlaybackEvent};
pub use raster::RasterSurface;
pub use render_loop::{CancelToken, LoopHandle, RenderLoop};
pub use session::{spawn_session_loop, EditorSession, SessionParts};
pub use surface::{FontSpec, FrameSnapshot, Surface, VideoFrame};
