//! Shared plumbing for the system `ffmpeg` / `ffprobe` binaries.
//!
//! The pipeline talks to ffmpeg as a child process rather than linking `ffmpeg-next`, so no
//! native FFmpeg headers or libraries are needed at build time.

use std::{
    io::Read,
    path::{Path, PathBuf},
    process::{Child, ChildStderr, Command, ExitStatus, Stdio},
    thread::JoinHandle,
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};

use crate::foundation::error::{VerticutError, VerticutResult};

/// Program names (or paths) of the ffmpeg tools.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FfmpegTools {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Default for FfmpegTools {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

impl FfmpegTools {
    pub fn ffmpeg_available(&self) -> bool {
        program_runs(&self.ffmpeg)
    }

    pub fn ffprobe_available(&self) -> bool {
        program_runs(&self.ffprobe)
    }
}

/// Return `true` when `program -version` can be invoked successfully.
pub fn program_runs(program: &Path) -> bool {
    Command::new(program)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Whether `ffmpeg -h encoder=<name>` describes the encoder, i.e. this build can use it.
pub fn encoder_available(ffmpeg: &Path, name: &str) -> Result<bool, RunFailure> {
    let mut cmd = Command::new(ffmpeg);
    cmd.args(["-hide_banner", "-h"]).arg(format!("encoder={name}"));
    let out = run_captured(&mut cmd, Some(Duration::from_secs(10)))?;
    Ok(out.status.success() && lists_encoder(&out.stdout, name))
}

/// Unknown encoders print "Codec '<name>' is not recognized" instead of an `Encoder` header.
pub(crate) fn lists_encoder(help: &str, name: &str) -> bool {
    let header = format!("Encoder {name} ");
    help.lines().any(|l| l.trim_start().starts_with(&header))
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> VerticutResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Background reader that empties a child's stderr so the pipe never fills up.
pub struct StderrDrain(Option<JoinHandle<std::io::Result<Vec<u8>>>>);

impl StderrDrain {
    pub fn spawn(mut stderr: ChildStderr) -> Self {
        Self(Some(std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok(bytes)
        })))
    }

    /// Join the reader and return what the child wrote, lossily decoded.
    pub fn collect(&mut self) -> String {
        let Some(handle) = self.0.take() else {
            return String::new();
        };
        match handle.join() {
            Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).trim().to_string(),
            Ok(Err(e)) => format!("<stderr read failed: {e}>"),
            Err(_) => "<stderr drain thread panicked>".to_string(),
        }
    }
}

/// Captured result of a finished child process.
#[derive(Clone, Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug)]
pub enum RunFailure {
    Spawn(std::io::Error),
    Wait(std::io::Error),
    TimedOut(Duration),
}

impl std::fmt::Display for RunFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spawn(e) => write!(f, "failed to spawn (is it installed and on PATH?): {e}"),
            Self::Wait(e) => write!(f, "failed to wait for process: {e}"),
            Self::TimedOut(d) => write!(f, "timed out after {:.1}s", d.as_secs_f64()),
        }
    }
}

/// Run `cmd` to completion, capturing stdout and stderr.
///
/// With `timeout = None` this blocks until the child exits. Otherwise the child is killed once
/// the deadline passes.
pub fn run_captured(
    cmd: &mut Command,
    timeout: Option<Duration>,
) -> Result<ProcessOutput, RunFailure> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = cmd.spawn().map_err(RunFailure::Spawn)?;

    let mut stdout_drain = child.stdout.take().map(|mut out| {
        std::thread::spawn(move || {
            let mut bytes = Vec::new();
            let _ = out.read_to_end(&mut bytes);
            bytes
        })
    });
    let mut stderr_drain = child.stderr.take().map(StderrDrain::spawn);

    let status = match wait_with_deadline(&mut child, timeout) {
        Ok(status) => status,
        Err(failure) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(failure);
        }
    };

    let stdout = stdout_drain
        .take()
        .and_then(|h| h.join().ok())
        .map(|b| String::from_utf8_lossy(&b).trim().to_string())
        .unwrap_or_default();
    let stderr = stderr_drain
        .as_mut()
        .map(StderrDrain::collect)
        .unwrap_or_default();

    Ok(ProcessOutput {
        status,
        stdout,
        stderr,
    })
}

fn wait_with_deadline(
    child: &mut Child,
    timeout: Option<Duration>,
) -> Result<ExitStatus, RunFailure> {
    let Some(timeout) = timeout else {
        return child.wait().map_err(RunFailure::Wait);
    };
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait().map_err(RunFailure::Wait)? {
            return Ok(status);
        }
        if started.elapsed() >= timeout {
            return Err(RunFailure::TimedOut(timeout));
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

/// Terminate a child that is still running and reap it.
pub fn kill_and_reap(child: &mut Child) {
    if let Ok(None) = child.try_wait() {
        let _ = child.kill();
    }
    let _ = child.wait();
}

pub(crate) fn spawn_error(program: &Path, e: &std::io::Error) -> VerticutError {
    VerticutError::media(format!(
        "failed to spawn '{}' (is it installed and on PATH?): {e}",
        program.display()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_program_does_not_run() {
        assert!(!program_runs(Path::new("verticut-definitely-not-a-real-binary")));
    }

    #[test]
    fn run_captured_reports_spawn_failure() {
        let mut cmd = Command::new("verticut-definitely-not-a-real-binary");
        let err = run_captured(&mut cmd, None).unwrap_err();
        assert!(matches!(err, RunFailure::Spawn(_)));
        assert!(err.to_string().contains("failed to spawn"));
    }

    #[test]
    fn ensure_parent_dir_creates_nested_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a").join("b").join("out.mp4");
        ensure_parent_dir(&target).unwrap();
        assert!(target.parent().unwrap().is_dir());
        ensure_parent_dir(Path::new("bare.mp4")).unwrap();
    }

    #[test]
    fn encoder_header_is_matched_exactly() {
        let help = "Encoder libx264 [libx264 H.264 / AVC / MPEG-4 AVC / MPEG-4 part 10]:\n    \
                    General capabilities: delay threads";
        assert!(lists_encoder(help, "libx264"));
        assert!(!lists_encoder(help, "libx265"));
        assert!(!lists_encoder(
            "Encoder libx264rgb [libx264 H.264 RGB]:",
            "libx264"
        ));
        assert!(!lists_encoder(
            "Codec 'libx264' is not recognized by FFmpeg.",
            "libx264"
        ));
    }

    #[test]
    fn encoder_check_surfaces_missing_program() {
        let err = encoder_available(Path::new("verticut-definitely-not-a-real-binary"), "libx264")
            .unwrap_err();
        assert!(matches!(err, RunFailure::Spawn(_)));
    }

    #[cfg(unix)]
    #[test]
    fn run_captured_collects_output_and_status() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo out; echo err 1>&2; exit 3"]);
        let out = run_captured(&mut cmd, None).unwrap();
        assert_eq!(out.status.code(), Some(3));
        assert_eq!(out.stdout, "out");
        assert_eq!(out.stderr, "err");
    }

    #[cfg(unix)]
    #[test]
    fn run_captured_enforces_timeout() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "sleep 5"]);
        let err = run_captured(&mut cmd, Some(Duration::from_millis(100))).unwrap_err();
        assert!(matches!(err, RunFailure::TimedOut(_)));
    }
}
