//! Audio reattachment through an external transcoder.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use crate::ffmpeg::{ProcessOutput, RunFailure, run_captured};
use crate::foundation::error::{VerticutError, VerticutResult};

/// What the collaborator printed on a successful invocation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TranscodeOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Demux and remux operations delegated to an external tool.
pub trait Transcoder {
    /// Copy the first audio track of `source` into `audio_out` without re-encoding.
    ///
    /// Fails with `AudioExtract`.
    fn extract_audio(&self, source: &Path, audio_out: &Path) -> VerticutResult<TranscodeOutput>;

    /// Combine the first video track of `video` with the first audio track of `audio`.
    ///
    /// Fails with `Merge`.
    fn mux(&self, video: &Path, audio: &Path, output: &Path) -> VerticutResult<TranscodeOutput>;
}

/// `ffmpeg` command-line transcoder.
#[derive(Clone, Debug)]
pub struct FfmpegTranscoder {
    pub program: PathBuf,
    /// `None` waits for each invocation indefinitely.
    pub timeout: Option<Duration>,
    /// Overwrite the final output if it already exists.
    pub overwrite: bool,
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            timeout: None,
            overwrite: true,
        }
    }
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    fn run(&self, args: Vec<OsString>) -> Result<ProcessOutput, RunFailure> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args);
        run_captured(&mut cmd, self.timeout)
    }
}

impl Transcoder for FfmpegTranscoder {
    fn extract_audio(&self, source: &Path, audio_out: &Path) -> VerticutResult<TranscodeOutput> {
        let out = self
            .run(extract_args(source, audio_out))
            .map_err(|e| VerticutError::audio_extract(format!("ffmpeg {e}"), ""))?;
        if !out.status.success() {
            return Err(VerticutError::audio_extract(
                format!("ffmpeg exited with status {}", out.status),
                out.stderr,
            ));
        }
        Ok(TranscodeOutput {
            stdout: out.stdout,
            stderr: out.stderr,
        })
    }

    fn mux(&self, video: &Path, audio: &Path, output: &Path) -> VerticutResult<TranscodeOutput> {
        let out = self
            .run(mux_args(video, audio, output, self.overwrite))
            .map_err(|e| VerticutError::merge(format!("ffmpeg {e}"), ""))?;
        if !out.status.success() {
            return Err(VerticutError::merge(
                format!("ffmpeg exited with status {}", out.status),
                out.stderr,
            ));
        }
        Ok(TranscodeOutput {
            stdout: out.stdout,
            stderr: out.stderr,
        })
    }
}

pub(crate) fn extract_args(source: &Path, audio_out: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-y", "-hide_banner", "-nostdin", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(source.as_os_str().to_owned());
    args.extend(
        ["-vn", "-map", "0:a:0", "-c:a", "copy"]
            .into_iter()
            .map(OsString::from),
    );
    args.push(audio_out.as_os_str().to_owned());
    args
}

pub(crate) fn mux_args(video: &Path, audio: &Path, output: &Path, overwrite: bool) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        OsString::from(if overwrite { "-y" } else { "-n" }),
        OsString::from("-hide_banner"),
        OsString::from("-nostdin"),
        OsString::from("-i"),
        video.as_os_str().to_owned(),
        OsString::from("-i"),
        audio.as_os_str().to_owned(),
    ];
    // Explicit maps: video from the silent transform, audio from the extracted track.
    args.extend(
        [
            "-map",
            "0:v:0",
            "-map",
            "1:a:0",
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "-c:a",
            "aac",
            "-movflags",
            "+faststart",
        ]
        .into_iter()
        .map(OsString::from),
    );
    args.push(output.as_os_str().to_owned());
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn extract_stream_copies_first_audio_track() {
        let args = strings(&extract_args(Path::new("in.mp4"), Path::new("a.mka")));
        let joined = args.join(" ");
        assert!(joined.contains("-i in.mp4"));
        assert!(joined.contains("-vn -map 0:a:0 -c:a copy"));
        assert_eq!(args.last().map(String::as_str), Some("a.mka"));
    }

    #[test]
    fn mux_maps_streams_explicitly() {
        let args = strings(&mux_args(
            Path::new("silent.mp4"),
            Path::new("a.mka"),
            Path::new("out.mp4"),
            false,
        ));
        let joined = args.join(" ");
        assert_eq!(args[0], "-n");
        assert!(joined.contains("-i silent.mp4 -i a.mka"));
        assert!(joined.contains("-map 0:v:0 -map 1:a:0"));
        assert!(joined.contains("-c:v libx264"));
        assert!(joined.contains("-c:a aac"));
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
    }

    #[test]
    fn missing_program_surfaces_as_typed_errors() {
        let t = FfmpegTranscoder::new("verticut-definitely-not-a-real-binary");
        let err = t
            .extract_audio(Path::new("in.mp4"), Path::new("a.mka"))
            .unwrap_err();
        assert!(matches!(err, VerticutError::AudioExtract { .. }));

        let err = t
            .mux(Path::new("v.mp4"), Path::new("a.mka"), Path::new("o.mp4"))
            .unwrap_err();
        assert!(matches!(err, VerticutError::Merge { .. }));
    }
}
