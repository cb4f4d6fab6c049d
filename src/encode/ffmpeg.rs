use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use crate::encode::sink::{FrameSink, SinkConfig, check_frame};
use crate::ffmpeg::{
    FfmpegTools, StderrDrain, encoder_available, ensure_parent_dir, kill_and_reap, spawn_error,
};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{VerticutError, VerticutResult};
use crate::frame::Frame;

const VIDEO_ENCODER: &str = "libx264";

/// Silent video sink that spawns the system `ffmpeg` and streams raw `rgb24` frames to stdin.
///
/// Output is H.264 + yuv420p with no audio track.
pub struct FfmpegSink {
    out_path: PathBuf,
    cfg: SinkConfig,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr: StderrDrain,
    last_idx: Option<FrameIndex>,
}

impl FfmpegSink {
    /// Start the encoder. Every failure here is a `SinkOpen` error.
    pub fn open(tools: &FfmpegTools, out_path: &Path, cfg: SinkConfig) -> VerticutResult<Self> {
        cfg.validate()
            .map_err(|e| VerticutError::sink_open(out_path, e.to_string()))?;
        ensure_parent_dir(out_path).map_err(|e| VerticutError::sink_open(out_path, e.to_string()))?;
        match encoder_available(&tools.ffmpeg, VIDEO_ENCODER) {
            Ok(true) => {}
            Ok(false) => {
                return Err(VerticutError::sink_open(
                    out_path,
                    format!(
                        "'{}' does not provide the {VIDEO_ENCODER} encoder",
                        tools.ffmpeg.display()
                    ),
                ));
            }
            Err(e) => return Err(VerticutError::sink_open(out_path, format!("ffmpeg {e}"))),
        }
        // Probe writability up front; ffmpeg only reports it after the first frames arrive.
        std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(out_path)
            .map_err(|e| VerticutError::sink_open(out_path, format!("not writable: {e}")))?;

        let mut cmd = Command::new(&tools.ffmpeg);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd.args([
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgb24",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            // For rawvideo input, `-r` goes before `-i` to set the input frame rate.
            "-r",
            &cfg.fps.to_string(),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            VIDEO_ENCODER,
            "-pix_fmt",
            "yuv420p",
        ])
        .arg(out_path);

        let mut child = cmd.spawn().map_err(|e| {
            VerticutError::sink_open(out_path, spawn_error(&tools.ffmpeg, &e).to_string())
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| VerticutError::sink_open(out_path, "failed to open encoder stdin"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| VerticutError::sink_open(out_path, "failed to open encoder stderr"))?;

        tracing::debug!(
            path = %out_path.display(),
            width = cfg.width,
            height = cfg.height,
            fps = %cfg.fps,
            "opened silent sink"
        );

        Ok(Self {
            out_path: out_path.to_path_buf(),
            cfg,
            child: Some(child),
            stdin: Some(stdin),
            stderr: StderrDrain::spawn(stderr),
            last_idx: None,
        })
    }

    fn wait_encoder(&mut self) -> VerticutResult<()> {
        drop(self.stdin.take());
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child
            .wait()
            .map_err(|e| VerticutError::media(format!("failed to wait for encoder: {e}")))?;
        let stderr = self.stderr.collect();
        if !status.success() {
            return Err(VerticutError::media(format!(
                "ffmpeg encoder for '{}' exited with status {status}: {stderr}",
                self.out_path.display()
            )));
        }
        Ok(())
    }
}

impl FrameSink for FfmpegSink {
    fn push_frame(&mut self, idx: FrameIndex, frame: &Frame) -> VerticutResult<()> {
        check_frame(&self.cfg, &mut self.last_idx, idx, frame)?;
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(VerticutError::media("ffmpeg sink is already finalized"));
        };
        if let Err(e) = stdin.write_all(&frame.data) {
            // A broken pipe means the encoder died; its stderr says why.
            let detail = match self.wait_encoder() {
                Err(err) => err.to_string(),
                Ok(()) => String::new(),
            };
            return Err(VerticutError::media(format!(
                "failed to write frame to ffmpeg stdin: {e} {detail}"
            )));
        }
        Ok(())
    }

    fn finish(&mut self) -> VerticutResult<()> {
        self.wait_encoder()
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            kill_and_reap(&mut child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::Fps;

    #[test]
    fn unwritable_path_is_a_sink_open_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened as the output file.
        let err = FfmpegSink::open(
            &FfmpegTools::default(),
            dir.path(),
            SinkConfig {
                width: 4,
                height: 4,
                fps: Fps::new(30, 1).unwrap(),
            },
        )
        .err()
        .unwrap();
        assert!(matches!(err, VerticutError::SinkOpen { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn ffmpeg_without_libx264_is_a_sink_open_error() {
        // `true` exits 0 and prints nothing, like an ffmpeg build that lacks the encoder.
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("silent.mp4");
        let tools = FfmpegTools {
            ffmpeg: "true".into(),
            ..FfmpegTools::default()
        };
        let err = FfmpegSink::open(
            &tools,
            &out,
            SinkConfig {
                width: 4,
                height: 4,
                fps: Fps::new(30, 1).unwrap(),
            },
        )
        .err()
        .unwrap();
        match err {
            VerticutError::SinkOpen { reason, .. } => assert!(reason.contains("libx264")),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!out.exists());
    }

    #[test]
    fn odd_dimensions_are_a_sink_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FfmpegSink::open(
            &FfmpegTools::default(),
            &dir.path().join("out.mp4"),
            SinkConfig {
                width: 5,
                height: 4,
                fps: Fps::new(30, 1).unwrap(),
            },
        )
        .err()
        .unwrap();
        assert!(matches!(err, VerticutError::SinkOpen { .. }));
    }
}
