//! Real-time playback by decoding through an `ffmpeg` child process.

use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::JoinHandle;

use reeltext_common::{ReeltextError, ReeltextResult};
use reeltext_overlay_model::source::SourceVideo;
use reeltext_render_engine::media::{MediaPlayer, PlaybackEvent};
use reeltext_render_engine::surface::VideoFrame;

use crate::probe::probe_video;
use crate::process::{kill_and_reap, last_line, StderrDrain};

/// Frames buffered between the reader thread and the session.
const FRAME_QUEUE_DEPTH: usize = 8;

enum DecoderMsg {
    Frame(Vec<u8>),
    Eof,
    ReadError(String),
}

/// One running `ffmpeg` decode process.
struct Decoder {
    child: Child,
    rx: Receiver<DecoderMsg>,
    reader: Option<JoinHandle<()>>,
    stderr: Option<StderrDrain>,
    start_secs: f64,
    frames: u64,
}

impl Decoder {
    fn spawn(source: &SourceVideo, start_secs: f64) -> ReeltextResult<Self> {
        let args = decode_args(&source.path, start_secs, true);
        tracing::debug!(args = ?args, "Starting ffmpeg decoder");

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ReeltextError::capability(
                    format!("failed to start ffmpeg decoder: {e}"),
                    "install ffmpeg and make sure it is on PATH",
                )
            })?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| ReeltextError::resource("failed to capture ffmpeg stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ReeltextError::resource("failed to capture ffmpeg stderr"))?;

        let frame_len = source.width as usize * source.height as usize * 4;
        let (tx, rx) = mpsc::sync_channel(FRAME_QUEUE_DEPTH);
        let reader = std::thread::spawn(move || loop {
            let mut buf = vec![0u8; frame_len];
            let msg = match stdout.read_exact(&mut buf) {
                Ok(()) => DecoderMsg::Frame(buf),
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => DecoderMsg::Eof,
                Err(e) => DecoderMsg::ReadError(e.to_string()),
            };
            let last = !matches!(msg, DecoderMsg::Frame(_));
            if tx.send(msg).is_err() || last {
                break;
            }
        });

        Ok(Self {
            child,
            rx,
            reader: Some(reader),
            stderr: Some(StderrDrain::spawn(stderr)),
            start_secs,
            frames: 0,
        })
    }

    /// Kill the process and join its threads.
    fn stop(mut self) {
        kill_and_reap(&mut self.child);
        // Unblock a reader waiting on a full queue.
        while self.rx.try_recv().is_ok() {}
        drop(self.rx);
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
        if let Some(stderr) = self.stderr.take() {
            stderr.finish();
        }
    }

    /// Reap a process whose output has ended. Returns stderr on failure.
    fn finish(mut self) -> Result<(), String> {
        let status = self.child.wait().map_err(|e| e.to_string())?;
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
        let stderr = self.stderr.take().map(StderrDrain::finish).unwrap_or_default();
        if status.success() {
            Ok(())
        } else {
            Err(format!("ffmpeg exited with {status}: {}", last_line(&stderr)))
        }
    }
}

/// A [`MediaPlayer`] that decodes with `ffmpeg -re`.
///
/// Playback position advances with the number of decoded frames, so the
/// clock follows the decoder rather than the wall.
pub struct FfmpegPlayer {
    source: SourceVideo,
    current_secs: f64,
    last_frame: Option<VideoFrame>,
    decoder: Option<Decoder>,
}

impl std::fmt::Debug for FfmpegPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegPlayer")
            .field("source", &self.source.path)
            .field("current_secs", &self.current_secs)
            .field("playing", &self.decoder.is_some())
            .finish()
    }
}

impl FfmpegPlayer {
    /// Probe `path` and decode a preview frame at zero.
    pub fn open(path: &Path) -> ReeltextResult<Self> {
        let source = probe_video(path)?;
        let mut player = Self::with_source(source);
        player.refresh_preview();
        Ok(player)
    }

    /// Wrap already-probed metadata without decoding anything.
    pub fn with_source(source: SourceVideo) -> Self {
        Self {
            source,
            current_secs: 0.0,
            last_frame: None,
            decoder: None,
        }
    }

    /// Override the session title that export file names derive from.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.source.title = title.into();
    }

    fn refresh_preview(&mut self) {
        match grab_frame(&self.source, self.current_secs) {
            Ok(frame) => self.last_frame = Some(frame),
            Err(e) => tracing::warn!(error = %e, at = self.current_secs, "Preview frame unavailable"),
        }
    }

    fn stop_decoder(&mut self) {
        if let Some(decoder) = self.decoder.take() {
            decoder.stop();
        }
    }
}

impl MediaPlayer for FfmpegPlayer {
    fn metadata(&self) -> &SourceVideo {
        &self.source
    }

    fn current_time(&self) -> f64 {
        self.current_secs
    }

    fn is_playing(&self) -> bool {
        self.decoder.is_some()
    }

    fn seek(&mut self, secs: f64) -> ReeltextResult<()> {
        let target = secs.clamp(0.0, self.source.duration_secs);
        let was_playing = self.decoder.is_some();
        self.stop_decoder();
        self.current_secs = target;
        if was_playing {
            self.decoder = Some(Decoder::spawn(&self.source, target)?);
        } else {
            self.refresh_preview();
        }
        Ok(())
    }

    fn play(&mut self) -> ReeltextResult<()> {
        if self.decoder.is_some() {
            return Ok(());
        }
        if self.current_secs >= self.source.duration_secs {
            self.current_secs = 0.0;
        }
        self.decoder = Some(Decoder::spawn(&self.source, self.current_secs)?);
        tracing::debug!(at = self.current_secs, "Playback started");
        Ok(())
    }

    fn pause(&mut self) -> ReeltextResult<()> {
        if self.decoder.is_some() {
            self.stop_decoder();
            tracing::debug!(at = self.current_secs, "Playback paused");
        }
        Ok(())
    }

    fn current_frame(&self) -> Option<&VideoFrame> {
        self.last_frame.as_ref()
    }

    fn poll_events(&mut self) -> Vec<PlaybackEvent> {
        let Some(decoder) = self.decoder.as_mut() else {
            return Vec::new();
        };

        let mut newest = None;
        let mut outcome = None;
        loop {
            match decoder.rx.try_recv() {
                Ok(DecoderMsg::Frame(pixels)) => {
                    decoder.frames += 1;
                    newest = Some(pixels);
                }
                Ok(DecoderMsg::Eof) | Err(TryRecvError::Disconnected) => {
                    outcome = Some(None);
                    break;
                }
                Ok(DecoderMsg::ReadError(message)) => {
                    outcome = Some(Some(message));
                    break;
                }
                Err(TryRecvError::Empty) => break,
            }
        }

        let fps = self.source.frame_rate.max(1.0);
        self.current_secs = (decoder.start_secs + decoder.frames as f64 / fps)
            .min(self.source.duration_secs);
        if let Some(pixels) = newest {
            self.last_frame = VideoFrame::new(self.source.width, self.source.height, pixels);
        }

        let Some(read_error) = outcome else {
            return Vec::new();
        };
        let Some(decoder) = self.decoder.take() else {
            return Vec::new();
        };
        let event = match (read_error, decoder.finish()) {
            (Some(message), _) | (None, Err(message)) => PlaybackEvent::Error { message },
            (None, Ok(())) => {
                self.current_secs = self.source.duration_secs;
                PlaybackEvent::Ended
            }
        };
        vec![event]
    }
}

impl Drop for FfmpegPlayer {
    fn drop(&mut self) {
        self.stop_decoder();
    }
}

/// Decode one frame at `secs` synchronously.
pub fn grab_frame(source: &SourceVideo, secs: f64) -> ReeltextResult<VideoFrame> {
    let mut args = decode_args(&source.path, secs, false);
    let out = args.pop();
    args.extend(["-frames:v".to_string(), "1".to_string()]);
    args.extend(out);

    let output = Command::new("ffmpeg")
        .args(&args)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| {
            ReeltextError::capability(
                format!("failed to run ffmpeg: {e}"),
                "install ffmpeg and make sure it is on PATH",
            )
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ReeltextError::resource(format!(
            "could not decode frame at {secs:.3}s: {}",
            last_line(&stderr)
        )));
    }

    VideoFrame::new(source.width, source.height, output.stdout).ok_or_else(|| {
        ReeltextError::resource(format!("no frame decoded at {secs:.3}s"))
    })
}

/// ffmpeg arguments decoding `path` from `start_secs` to raw RGBA on stdout.
fn decode_args(path: &Path, start_secs: f64, realtime: bool) -> Vec<String> {
    let mut args = vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-nostdin".to_string(),
    ];
    if realtime {
        args.push("-re".to_string());
    }
    args.extend([
        "-ss".to_string(),
        format!("{:.3}", start_secs.max(0.0)),
        "-i".to_string(),
        path.to_string_lossy().into_owned(),
        "-an".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pix_fmt".to_string(),
        "rgba".to_string(),
        "-".to_string(),
    ]);
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_realtime_decode_args() {
        let args = decode_args(Path::new("/v/clip.mp4"), 2.5, true);
        let joined = args.join(" ");
        assert!(joined.contains("-re -ss 2.500 -i /v/clip.mp4"));
        assert!(joined.ends_with("-an -f rawvideo -pix_fmt rgba -"));
    }

    #[test]
    fn test_still_decode_args_have_no_realtime_flag() {
        let args = decode_args(Path::new("clip.mp4"), -1.0, false);
        assert!(!args.contains(&"-re".to_string()));
        assert!(args.contains(&"0.000".to_string()));
    }

    #[test]
    fn test_player_without_decoder_is_idle() {
        let mut player = FfmpegPlayer::with_source(SourceVideo {
            path: PathBuf::from("clip.mp4"),
            title: "clip".to_string(),
            duration_secs: 4.0,
            width: 2,
            height: 2,
            frame_rate: 25.0,
            has_audio: false,
        });
        assert!(!player.is_playing());
        assert!(player.poll_events().is_empty());
        assert!(player.current_frame().is_none());
        player.pause().unwrap();
        assert_eq!(player.current_time(), 0.0);
    }
}
