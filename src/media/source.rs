use std::collections::VecDeque;
use std::ffi::OsString;
use std::io::{BufReader, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

use crate::ffmpeg::{FfmpegTools, StderrDrain, kill_and_reap, spawn_error};
use crate::foundation::error::{VerticutError, VerticutResult};
use crate::frame::{Frame, frame_len};
use crate::media::probe::{SourceInfo, probe_source};

/// Single-pass, in-order reader of decoded frames.
pub trait FrameSource {
    /// Stream facts captured when the source was opened.
    fn info(&self) -> &SourceInfo;
    /// Next frame in decode order, or `None` once the stream is exhausted.
    fn next_frame(&mut self) -> VerticutResult<Option<Frame>>;
    /// Release the underlying decoder. Safe to call more than once.
    fn close(&mut self) -> VerticutResult<()>;
}

/// Decodes a video file by streaming `rgb24` frames out of a child `ffmpeg`.
pub struct FfmpegSource {
    info: SourceInfo,
    child: Option<Child>,
    stdout: Option<BufReader<ChildStdout>>,
    stderr: StderrDrain,
    frame_len: usize,
    exhausted: bool,
}

impl FfmpegSource {
    /// Probe the file and start the decoder. Fails with `SourceOpen`.
    pub fn open(tools: &FfmpegTools, path: &Path) -> VerticutResult<Self> {
        let info = probe_source(&tools.ffprobe, path)?;
        let frame_len = frame_len(info.width, info.height)
            .map_err(|e| VerticutError::source_open(path, e.to_string()))?;

        let mut child = Command::new(&tools.ffmpeg)
            .args(decode_args(path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| VerticutError::source_open(path, spawn_error(&tools.ffmpeg, &e).to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| VerticutError::source_open(path, "failed to open decoder stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| VerticutError::source_open(path, "failed to open decoder stderr"))?;

        tracing::debug!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            fps = %info.fps,
            frames = ?info.frame_count,
            has_audio = info.has_audio,
            "opened source"
        );

        Ok(Self {
            info,
            child: Some(child),
            stdout: Some(BufReader::with_capacity(frame_len.min(1 << 24), stdout)),
            stderr: StderrDrain::spawn(stderr),
            frame_len,
            exhausted: false,
        })
    }

    fn finish_decoder(&mut self) -> VerticutResult<()> {
        drop(self.stdout.take());
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child
            .wait()
            .map_err(|e| VerticutError::media(format!("failed to wait for decoder: {e}")))?;
        let stderr = self.stderr.collect();
        if !status.success() {
            return Err(VerticutError::media(format!(
                "ffmpeg decoder exited with status {status}: {stderr}"
            )));
        }
        Ok(())
    }
}

impl FrameSource for FfmpegSource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn next_frame(&mut self) -> VerticutResult<Option<Frame>> {
        if self.exhausted {
            return Ok(None);
        }
        let Some(stdout) = self.stdout.as_mut() else {
            return Err(VerticutError::media("source is already closed"));
        };

        let mut buf = vec![0u8; self.frame_len];
        let filled = read_full(stdout, &mut buf)
            .map_err(|e| VerticutError::media(format!("failed to read decoded frame: {e}")))?;
        if filled == 0 {
            self.exhausted = true;
            self.finish_decoder()?;
            return Ok(None);
        }
        if filled < self.frame_len {
            self.exhausted = true;
            let _ = self.finish_decoder();
            return Err(VerticutError::media(format!(
                "decoder produced a truncated frame ({filled} of {} bytes)",
                self.frame_len
            )));
        }
        Frame::new(self.info.width, self.info.height, buf).map(Some)
    }

    fn close(&mut self) -> VerticutResult<()> {
        drop(self.stdout.take());
        if let Some(mut child) = self.child.take() {
            // Stopping early is not a decoder failure; just make sure the process is gone.
            kill_and_reap(&mut child);
            let _ = self.stderr.collect();
        }
        Ok(())
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Decoder arguments: first video track as raw `rgb24` on stdout.
///
/// `-fps_mode passthrough` keeps one output frame per decoded frame, also for variable-rate
/// sources. The decoder applies rotation metadata, so frames have the size the probe reports.
pub(crate) fn decode_args(path: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-v", "error", "-nostdin", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(path.as_os_str().to_owned());
    args.extend(
        [
            "-map",
            "0:v:0",
            "-an",
            "-sn",
            "-fps_mode",
            "passthrough",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgb24",
            "pipe:1",
        ]
        .into_iter()
        .map(OsString::from),
    );
    args
}

fn read_full(r: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// In-memory source for tests and debugging.
#[derive(Debug)]
pub struct InMemorySource {
    info: SourceInfo,
    frames: VecDeque<VerticutResult<Frame>>,
    closed: bool,
}

impl InMemorySource {
    pub fn new(info: SourceInfo, frames: Vec<Frame>) -> Self {
        Self {
            info,
            frames: frames.into_iter().map(Ok).collect(),
            closed: false,
        }
    }

    /// Queue a decode failure to be returned after the frames queued so far.
    pub fn push_error(&mut self, err: VerticutError) {
        self.frames.push_back(Err(err));
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl FrameSource for InMemorySource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn next_frame(&mut self) -> VerticutResult<Option<Frame>> {
        if self.closed {
            return Err(VerticutError::media("source is already closed"));
        }
        self.frames.pop_front().transpose()
    }

    fn close(&mut self) -> VerticutResult<()> {
        self.closed = true;
        Ok(())
    }
}
