//! The always-on redraw loop.
//!
//! The loop runs as a local task on a Tokio `LocalSet`, so the frame
//! callback may hold `Rc` state. It stops when its [`CancelToken`] fires;
//! the [`LoopHandle`] returned by [`RenderLoop::spawn`] is the only way to
//! fire it and is consumed in the process.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Shared cancellation flag with async notification.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the token. Returns `true` only for the call that fired it.
    pub fn cancel(&self) -> bool {
        let first = !self.inner.cancelled.swap(true, Ordering::SeqCst);
        if first {
            self.inner.notify.notify_waiters();
        }
        first
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once the token has fired.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Self-rescheduling frame loop.
pub struct RenderLoop;

impl RenderLoop {
    /// Spawn a loop calling `on_frame(frame_index)` at `fps`.
    ///
    /// Must be called from within a `LocalSet`. Late ticks are skipped
    /// rather than bunched up.
    pub fn spawn<F>(fps: u32, mut on_frame: F) -> LoopHandle
    where
        F: FnMut(u64) + 'static,
    {
        let token = CancelToken::new();
        let period = Duration::from_nanos(1_000_000_000 / fps.max(1) as u64);
        let task_token = token.clone();

        let join = tokio::task::spawn_local(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut frames: u64 = 0;

            tracing::debug!(fps, "Render loop started");
            loop {
                tokio::select! {
                    biased;
                    _ = task_token.cancelled() => break,
                    _ = interval.tick() => {
                        if task_token.is_cancelled() {
                            break;
                        }
                        on_frame(frames);
                        frames += 1;
                    }
                }
            }
            tracing::debug!(frames, "Render loop stopped");
            frames
        });

        LoopHandle {
            token,
            join: Some(join),
        }
    }
}

/// Ownership of a running render loop.
#[derive(Debug)]
pub struct LoopHandle {
    token: CancelToken,
    join: Option<JoinHandle<u64>>,
}

impl LoopHandle {
    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
            && self
                .join
                .as_ref()
                .map(|j| !j.is_finished())
                .unwrap_or(false)
    }

    /// Stop the loop. Await the returned task for the number of frames rendered.
    pub fn cancel(mut self) -> Option<JoinHandle<u64>> {
        self.token.cancel();
        self.join.take()
    }
}

impl Drop for LoopHandle {
    fn drop(&mut self) {
        if self.join.is_some() && self.token.cancel() {
            tracing::warn!("Render loop handle dropped without cancel; stopping loop");
        }
    }
}
