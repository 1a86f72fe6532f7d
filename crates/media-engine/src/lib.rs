//! reeltext Media Engine
//!
//! ffmpeg subprocess implementations of the render engine's collaborators:
//! probing, real-time decoding, audio taps, recording, and artifact delivery.
//!
//! # Process Layout
//!
//! ```text
//!              ┌──────────────────────────────┐
//! source.mp4 ──┤ ffmpeg -re … -f rawvideo -   ├──rgba frames──► FfmpegPlayer
//!              └──────────────────────────────┘
//!              ┌──────────────────────────────┐
//! snapshots ───┤ ffmpeg -f rawvideo -i - \    │
//! source.mp4 ──┤        -i source -map 1:a?   ├──64 KiB chunks──► FfmpegRecorder
//!              └──────────────────────────────┘
//! ```
//!
//! Every child process gets a reader thread per output pipe; threads talk to
//! the session only through channels drained on the render tick.

pub mod audio;
pub mod download;
pub mod player;
pub mod probe;
pub mod process;
pub mod recorder;

pub use audio::FfmpegAudioBackend;
pub use download::DirectoryDownloadSink;
pub use player::{grab_frame, FfmpegPlayer};
pub use probe::probe_video;
pub use process::{ffmpeg_available, ffprobe_available};
pub use recorder::{FfmpegCapture, FfmpegRecorder};
