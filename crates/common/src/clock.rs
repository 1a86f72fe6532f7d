//! Clock and pacing utilities.
//!
//! The editing session anchors continuous animations to a monotonic epoch
//! recorded when the session starts, so floating and ticker overlays keep
//! moving while the video is paused. Export capture is paced by a
//! [`FramePacer`] so the recorder receives exactly `fps` frames per second
//! of media time.

use std::time::Instant;

/// A monotonic clock anchored at the moment an editing session started.
#[derive(Debug, Clone)]
pub struct SessionClock {
    epoch: Instant,

    /// Wall-clock time at epoch (RFC 3339).
    epoch_wall: String,
}

impl SessionClock {
    /// Create a new clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Seconds elapsed since the epoch.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Wall-clock time at session start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }
}

/// Capture cadence tied to media time.
///
/// A stream at `fps` owes frame `n` once media time reaches `n / fps`, so the
/// number of frames handed out always matches elapsed media time no matter
/// how often, or how irregularly, the caller ticks. A slow caller gets
/// several frames owed at once; a fast one gets none on most ticks.
#[derive(Debug, Clone)]
pub struct FramePacer {
    fps: u32,
    emitted: u64,
    limit: Option<u64>,
}

impl FramePacer {
    pub fn new(fps: u32) -> Self {
        Self {
            fps: fps.max(1),
            emitted: 0,
            limit: None,
        }
    }

    /// Cap the stream at `round(duration × fps)` frames (at least one).
    pub fn with_duration(mut self, duration_secs: f64) -> Self {
        self.limit = Some(self.frames_for(duration_secs).max(1));
        self
    }

    /// Frames handed out so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Frames owed at `media_secs` and not yet handed out.
    pub fn frames_due(&self, media_secs: f64) -> u64 {
        let mut due = (media_secs.max(0.0) * self.fps as f64).floor() as u64 + 1;
        if let Some(limit) = self.limit {
            due = due.min(limit);
        }
        due.saturating_sub(self.emitted)
    }

    /// Frames still missing before the duration cap is reached.
    pub fn frames_remaining(&self) -> u64 {
        self.limit
            .map(|limit| limit.saturating_sub(self.emitted))
            .unwrap_or(0)
    }

    /// Record that `n` frames were handed out.
    pub fn advance(&mut self, n: u64) {
        self.emitted += n;
    }

    fn frames_for(&self, secs: f64) -> u64 {
        if secs.is_finite() && secs > 0.0 {
            (secs * self.fps as f64).round() as u64
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_elapsed() {
        let clock = SessionClock::start();
        assert!(clock.elapsed_secs() < 1.0);
        assert!(!clock.epoch_wall().is_empty());
    }

    #[test]
    fn test_pacer_owes_first_frame_immediately() {
        let pacer = FramePacer::new(30);
        assert_eq!(pacer.frames_due(0.0), 1);
        assert_eq!(pacer.frames_due(-3.0), 1);
    }

    #[test]
    fn test_pacer_matches_media_time_at_faster_tick_rate() {
        // 60 Hz ticks over 10 s of media at 30 fps capture.
        let mut pacer = FramePacer::new(30).with_duration(10.0);
        for tick in 0..600u64 {
            let media = tick as f64 / 60.0;
            let due = pacer.frames_due(media);
            pacer.advance(due);
        }
        pacer.advance(pacer.frames_remaining());
        assert_eq!(pacer.emitted(), 300);
    }

    #[test]
    fn test_pacer_catches_up_after_slow_ticks() {
        let mut pacer = FramePacer::new(30);
        pacer.advance(pacer.frames_due(0.0));
        // One tick 100 ms later owes three frames (at 1/30, 2/30, 3/30).
        assert_eq!(pacer.frames_due(0.1), 3);
        pacer.advance(3);
        assert_eq!(pacer.frames_due(0.1), 0);
    }

    #[test]
    fn test_pacer_respects_duration_cap() {
        let mut pacer = FramePacer::new(10).with_duration(1.0);
        assert_eq!(pacer.frames_due(5.0), 10);
        pacer.advance(4);
        assert_eq!(pacer.frames_remaining(), 6);
        assert_eq!(pacer.frames_due(0.35), 0);
    }

    #[test]
    fn test_pacer_zero_duration_still_owes_one_frame() {
        let pacer = FramePacer::new(30).with_duration(0.0);
        assert_eq!(pacer.frames_remaining(), 1);
    }
}
