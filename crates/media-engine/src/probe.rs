//! Source metadata via `ffprobe`.

use std::path::Path;
use std::process::Command;

use reeltext_common::{ReeltextError, ReeltextResult};
use reeltext_overlay_model::source::SourceVideo;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Probe a video file for size, duration, frame rate, and audio presence.
pub fn probe_video(path: &Path) -> ReeltextResult<SourceVideo> {
    if !path.exists() {
        return Err(ReeltextError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path)
        .output()
        .map_err(|e| {
            ReeltextError::capability(
                format!("failed to run ffprobe: {e}"),
                "install ffmpeg (which ships ffprobe) and make sure it is on PATH",
            )
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ReeltextError::resource(format!(
            "ffprobe could not read {}: {}",
            path.display(),
            stderr.trim()
        )));
    }

    let json = String::from_utf8_lossy(&output.stdout);
    let source = parse_probe_output(&json, path)?;
    tracing::debug!(
        path = %path.display(),
        width = source.width,
        height = source.height,
        duration = source.duration_secs,
        fps = source.frame_rate,
        has_audio = source.has_audio,
        "Probed video"
    );
    Ok(source)
}

/// Build a [`SourceVideo`] from `ffprobe -print_format json` output.
pub fn parse_probe_output(json: &str, path: &Path) -> ReeltextResult<SourceVideo> {
    let probe: ProbeOutput = serde_json::from_str(json)?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| {
            ReeltextError::resource(format!("{} has no video stream", path.display()))
        })?;
    let has_audio = probe
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(ReeltextError::resource(format!(
                "{} reports no picture size",
                path.display()
            )))
        }
    };

    let duration_secs = probe
        .format
        .as_ref()
        .and_then(|f| parse_seconds(f.duration.as_deref()))
        .or_else(|| parse_seconds(video.duration.as_deref()))
        .ok_or_else(|| {
            ReeltextError::resource(format!("{} reports no duration", path.display()))
        })?;

    let frame_rate = video
        .avg_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .or_else(|| video.r_frame_rate.as_deref().and_then(parse_rate))
        .unwrap_or(30.0);

    Ok(SourceVideo {
        path: path.to_path_buf(),
        title: SourceVideo::title_from_path(path),
        duration_secs,
        width,
        height,
        frame_rate,
        has_audio,
    })
}

fn parse_seconds(value: Option<&str>) -> Option<f64> {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
}

/// Parse `num/den` or a plain number. `0/0` yields `None`.
fn parse_rate(value: &str) -> Option<f64> {
    let rate = match value.split_once('/') {
        Some((num, den)) => {
            let num = num.trim().parse::<f64>().ok()?;
            let den = den.trim().parse::<f64>().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => value.trim().parse::<f64>().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {"index": 0, "codec_type": "video", "width": 1920, "height": 1080,
             "r_frame_rate": "30000/1001", "avg_frame_rate": "30000/1001", "duration": "12.012"},
            {"index": 1, "codec_type": "audio", "sample_rate": "48000"}
        ],
        "format": {"duration": "12.050000"}
    }"#;

    #[test]
    fn test_parse_probe_output() {
        let source = parse_probe_output(SAMPLE, Path::new("/videos/Beach Day.mp4")).unwrap();
        assert_eq!(source.width, 1920);
        assert_eq!(source.height, 1080);
        assert!((source.duration_secs - 12.05).abs() < 1e-9);
        assert!((source.frame_rate - 29.97).abs() < 0.01);
        assert!(source.has_audio);
        assert_eq!(source.title, "Beach Day");
    }

    #[test]
    fn test_parse_falls_back_to_stream_duration() {
        let json = r#"{"streams": [{"codec_type": "video", "width": 2, "height": 2,
                       "avg_frame_rate": "0/0", "r_frame_rate": "25/1", "duration": "3.5"}]}"#;
        let source = parse_probe_output(json, Path::new("a.webm")).unwrap();
        assert_eq!(source.duration_secs, 3.5);
        assert_eq!(source.frame_rate, 25.0);
        assert!(!source.has_audio);
    }

    #[test]
    fn test_audio_only_file_is_resource_error() {
        let json = r#"{"streams": [{"codec_type": "audio"}], "format": {"duration": "1"}}"#;
        let err = parse_probe_output(json, Path::new("song.mp3")).unwrap_err();
        assert!(matches!(err, ReeltextError::Resource { .. }));
    }

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate("60"), Some(60.0));
        assert_eq!(parse_rate("0/0"), None);
        assert_eq!(parse_rate("x"), None);
    }

    #[test]
    fn test_missing_file() {
        let err = probe_video(Path::new("/definitely/missing.mp4")).unwrap_err();
        assert!(matches!(err, ReeltextError::FileNotFound { .. }));
    }
}
