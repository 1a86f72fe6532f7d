//! Child-process helpers shared by the ffmpeg components.

use std::io::Read;
use std::process::{Child, ChildStderr, Command};
use std::thread::JoinHandle;

/// Whether `binary` resolves on `PATH`.
pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

pub fn ffmpeg_available() -> bool {
    command_exists("ffmpeg")
}

pub fn ffprobe_available() -> bool {
    command_exists("ffprobe")
}

/// Drains a child's stderr on a background thread so the child never blocks
/// on a full pipe. The collected text is used in error messages.
#[derive(Debug)]
pub struct StderrDrain {
    handle: Option<JoinHandle<String>>,
}

impl StderrDrain {
    pub fn spawn(stderr: ChildStderr) -> Self {
        let handle = std::thread::spawn(move || {
            let mut output = String::new();
            let mut stderr = stderr;
            match stderr.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });
        Self {
            handle: Some(handle),
        }
    }

    /// Wait for the pipe to close and return what was written.
    pub fn finish(mut self) -> String {
        self.handle
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or_else(|| "<failed to join stderr reader>".to_string())
    }
}

/// Kill a child and reap it, ignoring errors from an already-exited process.
pub fn kill_and_reap(child: &mut Child) {
    if let Err(e) = child.kill() {
        tracing::trace!(error = %e, "kill on exited child");
    }
    if let Err(e) = child.wait() {
        tracing::debug!(error = %e, "Failed to reap child process");
    }
}

/// Last non-empty line of ffmpeg's stderr, for compact error messages.
pub fn last_line(stderr: &str) -> &str {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
}
