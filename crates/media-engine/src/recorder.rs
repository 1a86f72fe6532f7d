//! Recording composited frames through an `ffmpeg` encoder process.
//!
//! Snapshots are written to the encoder's stdin as raw RGBA; the encoded
//! container streams back on stdout in fixed-size chunks.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread::JoinHandle;

use reeltext_common::{ReeltextError, ReeltextResult};
use reeltext_render_engine::audio::AudioTap;
use reeltext_render_engine::export::{
    extension_for, AudioCaptureStream, CaptureBackend, Recorder, RecorderOptions,
    VideoCaptureStream,
};
use reeltext_render_engine::surface::{FrameSnapshot, Surface};

use crate::process::{ffmpeg_available, kill_and_reap, last_line, StderrDrain};

const CHUNK_SIZE: usize = 64 * 1024;

/// [`CaptureBackend`] that encodes with a local ffmpeg.
#[derive(Debug, Default)]
pub struct FfmpegCapture;

impl FfmpegCapture {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureBackend for FfmpegCapture {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn is_supported(&self, mime_type: &str) -> bool {
        extension_for(mime_type).is_some() && ffmpeg_available()
    }

    fn capture_video(&mut self, surface: &dyn Surface, fps: u32) -> ReeltextResult<VideoCaptureStream> {
        let frame = surface.snapshot().ok_or_else(|| {
            ReeltextError::capability(
                "drawing surface cannot be read back",
                "export requires a raster surface",
            )
        })?;
        if frame.width == 0 || frame.height == 0 {
            return Err(ReeltextError::geometry("cannot capture an empty surface"));
        }
        Ok(VideoCaptureStream {
            width: frame.width,
            height: frame.height,
            fps: fps.max(1),
        })
    }

    fn capture_audio(&mut self, tap: &AudioTap) -> ReeltextResult<AudioCaptureStream> {
        Ok(AudioCaptureStream { tap: tap.clone() })
    }

    fn create_recorder(
        &mut self,
        video: VideoCaptureStream,
        audio: AudioCaptureStream,
        options: &RecorderOptions,
    ) -> ReeltextResult<Box<dyn Recorder>> {
        let audio_source = audio.tap.source.as_ref().filter(|_| audio.tap.has_audio);
        let args = recorder_args(&video, audio_source, options)?;
        Ok(Box::new(FfmpegRecorder::new(video, options.mime_type.clone(), args)))
    }
}

struct Running {
    child: Child,
    stdin: Option<ChildStdin>,
    chunks: Receiver<Vec<u8>>,
    reader: Option<JoinHandle<std::io::Result<()>>>,
    stderr: Option<StderrDrain>,
}

/// A single ffmpeg encode, from `start` until `stop` or `abort`.
pub struct FfmpegRecorder {
    video: VideoCaptureStream,
    mime_type: String,
    args: Vec<String>,
    running: Option<Running>,
}

impl std::fmt::Debug for FfmpegRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegRecorder")
            .field("video", &self.video)
            .field("mime_type", &self.mime_type)
            .field("running", &self.running.is_some())
            .finish()
    }
}

impl FfmpegRecorder {
    pub fn new(video: VideoCaptureStream, mime_type: String, args: Vec<String>) -> Self {
        Self {
            video,
            mime_type,
            args,
            running: None,
        }
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    fn running_mut(&mut self) -> ReeltextResult<&mut Running> {
        self.running
            .as_mut()
            .ok_or_else(|| ReeltextError::state("recorder is not running"))
    }
}

impl Recorder for FfmpegRecorder {
    fn start(&mut self) -> ReeltextResult<()> {
        if self.running.is_some() {
            return Err(ReeltextError::state("recorder already started"));
        }
        tracing::info!(args = %self.args.join(" "), "Starting ffmpeg recorder");

        let mut child = Command::new("ffmpeg")
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ReeltextError::capability(
                    format!("failed to start ffmpeg encoder: {e}"),
                    "install ffmpeg and make sure it is on PATH",
                )
            })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (Some(stdin), Some(mut stdout), Some(stderr)) = (stdin, stdout, stderr) else {
            kill_and_reap(&mut child);
            return Err(ReeltextError::resource("failed to open ffmpeg pipes"));
        };

        let (tx, rx) = mpsc::channel();
        let reader = std::thread::spawn(move || -> std::io::Result<()> {
            let mut buf = vec![0u8; CHUNK_SIZE];
            loop {
                let n = stdout.read(&mut buf)?;
                if n == 0 || tx.send(buf[..n].to_vec()).is_err() {
                    return Ok(());
                }
            }
        });

        self.running = Some(Running {
            child,
            stdin: Some(stdin),
            chunks: rx,
            reader: Some(reader),
            stderr: Some(StderrDrain::spawn(stderr)),
        });
        Ok(())
    }

    fn push_frame(&mut self, frame: &FrameSnapshot) -> ReeltextResult<()> {
        if frame.width != self.video.width || frame.height != self.video.height {
            return Err(ReeltextError::render(format!(
                "frame size changed during recording: {}x{} (expected {}x{})",
                frame.width, frame.height, self.video.width, self.video.height
            )));
        }
        let running = self.running_mut()?;
        let stdin = running
            .stdin
            .as_mut()
            .ok_or_else(|| ReeltextError::state("recorder input already closed"))?;
        stdin.write_all(&frame.pixels).map_err(|e| {
            ReeltextError::render(format!("ffmpeg encoder stopped accepting frames: {e}"))
        })
    }

    fn drain_chunks(&mut self) -> ReeltextResult<Vec<Vec<u8>>> {
        let running = self.running_mut()?;
        Ok(running.chunks.try_iter().collect())
    }

    fn stop(&mut self) -> ReeltextResult<Vec<Vec<u8>>> {
        let mut running = self
            .running
            .take()
            .ok_or_else(|| ReeltextError::state("recorder is not running"))?;

        // Closing stdin lets ffmpeg flush and write the trailer.
        drop(running.stdin.take());
        let status = running.child.wait()?;
        if let Some(reader) = running.reader.take() {
            match reader.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "ffmpeg output read failed"),
                Err(_) => tracing::warn!("ffmpeg output reader panicked"),
            }
        }
        let stderr = running
            .stderr
            .take()
            .map(StderrDrain::finish)
            .unwrap_or_default();

        if !status.success() {
            return Err(ReeltextError::render(format!(
                "ffmpeg encoder exited with {status}: {}",
                last_line(&stderr)
            )));
        }
        Ok(running.chunks.try_iter().collect())
    }

    fn abort(&mut self) {
        if let Some(mut running) = self.running.take() {
            drop(running.stdin.take());
            kill_and_reap(&mut running.child);
            if let Some(reader) = running.reader.take() {
                let _ = reader.join();
            }
            if let Some(stderr) = running.stderr.take() {
                stderr.finish();
            }
            tracing::debug!("ffmpeg recorder aborted");
        }
    }

    fn mime_type(&self) -> &str {
        &self.mime_type
    }
}

impl Drop for FfmpegRecorder {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Full ffmpeg command line for one recording.
fn recorder_args(
    video: &VideoCaptureStream,
    audio_source: Option<&PathBuf>,
    options: &RecorderOptions,
) -> ReeltextResult<Vec<String>> {
    let extension = extension_for(&options.mime_type).ok_or_else(|| {
        ReeltextError::capability(
            format!("unknown export container '{}'", options.mime_type),
            "set export.mime_type to video/webm or video/mp4",
        )
    })?;

    let mut args = vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pix_fmt".to_string(),
        "rgba".to_string(),
        "-s".to_string(),
        format!("{}x{}", video.width, video.height),
        "-r".to_string(),
        video.fps.to_string(),
        "-i".to_string(),
        "-".to_string(),
    ];

    if let Some(source) = audio_source {
        args.push("-i".to_string());
        args.push(source.display().to_string());
        args.push("-map".to_string());
        args.push("0:v".to_string());
        args.push("-map".to_string());
        args.push("1:a?".to_string());
        args.push("-shortest".to_string());
    }

    args.append(&mut codec_args(extension, options));
    args.push("-".to_string());
    Ok(args)
}

fn codec_args(extension: &str, options: &RecorderOptions) -> Vec<String> {
    let video_bitrate = format!("{}k", options.video_bitrate_kbps.max(100));
    let audio_bitrate = format!("{}k", options.audio_bitrate_kbps.max(32));

    match extension {
        "mp4" => vec![
            "-vf".to_string(),
            "scale=trunc(iw/2)*2:trunc(ih/2)*2".to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "veryfast".to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-b:v".to_string(),
            video_bitrate,
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            audio_bitrate,
            "-movflags".to_string(),
            "frag_keyframe+empty_moov".to_string(),
            "-f".to_string(),
            "mp4".to_string(),
        ],
        _ => vec![
            "-c:v".to_string(),
            "libvpx".to_string(),
            "-deadline".to_string(),
            "realtime".to_string(),
            "-b:v".to_string(),
            video_bitrate,
            "-c:a".to_string(),
            "libopus".to_string(),
            "-b:a".to_string(),
            audio_bitrate,
            "-f".to_string(),
            "webm".to_string(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video() -> VideoCaptureStream {
        VideoCaptureStream {
            width: 640,
            height: 360,
            fps: 30,
        }
    }

    fn options(mime: &str) -> RecorderOptions {
        RecorderOptions {
            mime_type: mime.to_string(),
            video_bitrate_kbps: 4000,
            audio_bitrate_kbps: 128,
        }
    }

    #[test]
    fn test_webm_args_with_audio() {
        let source = PathBuf::from("/videos/trip.mp4");
        let args = recorder_args(&video(), Some(&source), &options("video/webm;codecs=vp8,opus"))
            .unwrap()
            .join(" ");
        assert!(args.contains("-f rawvideo -pix_fmt rgba -s 640x360 -r 30 -i -"));
        assert!(args.contains("-i /videos/trip.mp4 -map 0:v -map 1:a? -shortest"));
        assert!(args.contains("-c:v libvpx"));
        assert!(args.contains("-c:a libopus -b:a 128k"));
        assert!(args.ends_with("-f webm -"));
    }

    #[test]
    fn test_mp4_args_without_audio() {
        let args = recorder_args(&video(), None, &options("video/mp4")).unwrap();
        let joined = args.join(" ");
        assert!(!joined.contains("-map"));
        assert!(joined.contains("-c:v libx264"));
        assert!(joined.contains("-movflags frag_keyframe+empty_moov"));
        assert!(joined.ends_with("-f mp4 -"));
    }

    #[test]
    fn test_unknown_container_is_capability_error() {
        let err = recorder_args(&video(), None, &options("video/x-matroska")).unwrap_err();
        assert!(err.hint().is_some());
    }

    #[test]
    fn test_silent_tap_records_video_only() {
        let mut capture = FfmpegCapture::new();
        let tap = AudioTap {
            id: 1,
            source: Some(PathBuf::from("/videos/silent.mp4")),
            has_audio: false,
        };
        let audio = capture.capture_audio(&tap).unwrap();
        let recorder = capture
            .create_recorder(video(), audio, &options("video/webm"))
            .unwrap();
        assert_eq!(recorder.mime_type(), "video/webm");
    }

    #[test]
    fn test_recorder_rejects_resized_frames_and_idle_drain() {
        let mut recorder = FfmpegRecorder::new(video(), "video/webm".to_string(), Vec::new());
        let frame = FrameSnapshot {
            width: 2,
            height: 2,
            pixels: vec![0; 16],
        };
        assert!(recorder.push_frame(&frame).is_err());
        assert!(recorder.drain_chunks().unwrap_err().is_state());
        recorder.abort();
    }
}
