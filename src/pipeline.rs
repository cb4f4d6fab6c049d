//! Whole-video reframe: silent transform, then audio reattachment.
//!
//! Run states:
//!
//! `Idle -> DecodingSource -> SinkClosed -> ExtractingAudio -> Merging -> Cleanup -> Done`
//!
//! Any failure moves the run to `Failed` and skips every later state. A pipeline runs exactly
//! once; there is no resume or retry.

use std::path::PathBuf;

use crate::compositor::{composite_frame, composite_with_layout};
use crate::config::{PipelineConfig, TempPaths, new_run_id};
use crate::encode::sink::{FrameSink, SinkConfig};
use crate::ffmpeg::ensure_parent_dir;
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{VerticutError, VerticutResult};
use crate::geometry::{LayerLayout, TargetGeometry};
use crate::media::probe::SourceInfo;
use crate::media::source::FrameSource;
use crate::media::{FfmpegMedia, MediaBackend};
use crate::report::{FailureReporter, NoopReporter};
use crate::transcode::{FfmpegTranscoder, TranscodeOutput, Transcoder};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunState {
    Idle,
    DecodingSource,
    SinkClosed,
    ExtractingAudio,
    Merging,
    Cleanup,
    Done,
    Failed(String),
}

/// A temp artifact that could not be deleted after a successful run. Not fatal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TempCleanupWarning {
    pub path: PathBuf,
    pub error: String,
}

impl std::fmt::Display for TempCleanupWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "failed to delete temp file '{}': {}",
            self.path.display(),
            self.error
        )
    }
}

/// Outcome of a successful run.
#[derive(Clone, Debug)]
pub struct RunSummary {
    pub output: PathBuf,
    pub source: SourceInfo,
    pub frames_written: u64,
    pub temp: TempPaths,
    pub warnings: Vec<TempCleanupWarning>,
}

/// Result of Stage A.
#[derive(Clone, Debug)]
pub struct SilentTransform {
    pub source: SourceInfo,
    pub frames_written: u64,
    pub video: PathBuf,
}

pub struct Pipeline<M: MediaBackend, T: Transcoder> {
    config: PipelineConfig,
    media: M,
    transcoder: T,
    reporter: Box<dyn FailureReporter>,
    temp: TempPaths,
    state: RunState,
}

impl Pipeline<FfmpegMedia, FfmpegTranscoder> {
    /// Pipeline wired to the system `ffmpeg` / `ffprobe`.
    pub fn with_ffmpeg(config: PipelineConfig) -> VerticutResult<Self> {
        let media = FfmpegMedia::new(config.tools.clone());
        let transcoder = FfmpegTranscoder::new(config.tools.ffmpeg.clone())
            .with_timeout(config.collaborator_timeout())
            .with_overwrite(config.overwrite);
        Self::new(config, media, transcoder)
    }
}

impl<M: MediaBackend, T: Transcoder> Pipeline<M, T> {
    pub fn new(config: PipelineConfig, media: M, transcoder: T) -> VerticutResult<Self> {
        config.validate()?;
        let temp = config.temp_paths(&new_run_id());
        Ok(Self {
            config,
            media,
            transcoder,
            reporter: Box::new(NoopReporter),
            temp,
            state: RunState::Idle,
        })
    }

    pub fn with_reporter(mut self, reporter: impl FailureReporter + 'static) -> Self {
        self.reporter = Box::new(reporter);
        self
    }

    /// Replace the generated run id (and with it the generated temp names).
    pub fn with_run_id(mut self, run_id: &str) -> Self {
        self.temp = self.config.temp_paths(run_id);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn temp_paths(&self) -> &TempPaths {
        &self.temp
    }

    /// Run both stages. On failure the message is also sent to the failure reporter.
    pub fn run(&mut self) -> VerticutResult<RunSummary> {
        if self.state != RunState::Idle {
            return Err(VerticutError::validation(
                "pipeline has already run; build a new one to run again",
            ));
        }
        match self.run_stages() {
            Ok(summary) => Ok(summary),
            Err(err) => {
                let message = err.to_string();
                tracing::error!(kind = err.kind(), "{message}");
                self.state = RunState::Failed(format!("{}: {message}", err.kind()));
                self.reporter.report(&message);
                Err(err)
            }
        }
    }

    fn run_stages(&mut self) -> VerticutResult<RunSummary> {
        tracing::info!(
            source = %self.config.source.display(),
            output = %self.config.output.display(),
            "starting 9:16 conversion"
        );
        let silent = self.transform_silent()?;
        let warnings = self.reattach_audio(&silent)?;
        self.transition(RunState::Done);
        tracing::info!(output = %self.config.output.display(), "conversion finished");
        Ok(RunSummary {
            output: self.config.output.clone(),
            source: silent.source,
            frames_written: silent.frames_written,
            temp: self.temp.clone(),
            warnings,
        })
    }

    /// Stage A: decode, composite and encode every frame into the silent intermediate.
    fn transform_silent(&mut self) -> VerticutResult<SilentTransform> {
        self.transition(RunState::DecodingSource);
        let mut source = self.media.open_source(&self.config.source)?;
        let info = source.info().clone();

        if !self.config.overwrite && self.config.output.exists() {
            let _ = source.close();
            return Err(VerticutError::validation(format!(
                "output file '{}' already exists",
                self.config.output.display()
            )));
        }

        let geometry = &self.config.geometry;
        let layout = match geometry.layout(info.width, info.height) {
            Ok(layout) => layout,
            Err(e) => {
                let _ = source.close();
                return Err(e);
            }
        };
        tracing::debug!(
            source = %format!("{}x{}", info.width, info.height),
            background = ?layout.background,
            foreground = ?layout.foreground,
            top_margin = layout.top_margin(),
            bottom_margin = layout.bottom_margin(),
            foreground_zoom = geometry.foreground_zoom,
            "layer layout"
        );

        let sink_cfg = SinkConfig {
            width: layout.canvas.width,
            height: layout.canvas.height,
            fps: info.fps,
        };
        let mut sink = match self.media.open_sink(&self.temp.video, sink_cfg) {
            Ok(sink) => sink,
            Err(e) => {
                let _ = source.close();
                return Err(e);
            }
        };

        let driven = drive_frames(
            source.as_mut(),
            sink.as_mut(),
            &layout,
            geometry,
            self.config.progress_interval,
            info.frame_count,
        );
        let source_closed = source.close();

        let frames_written = match driven {
            Ok(n) => n,
            Err(e) => {
                if let Err(close_err) = sink.finish() {
                    tracing::debug!(error = %close_err, "sink close after failed transform");
                }
                return Err(e);
            }
        };
        sink.finish()?;
        source_closed?;

        if frames_written == 0 {
            return Err(VerticutError::media("source produced no video frames"));
        }
        self.transition(RunState::SinkClosed);
        tracing::info!(frames = frames_written, video = %self.temp.video.display(), "silent transform complete");

        Ok(SilentTransform {
            source: info,
            frames_written,
            video: self.temp.video.clone(),
        })
    }

    /// Stage B: extract the source audio, merge it onto the silent video, clean up.
    fn reattach_audio(&mut self, silent: &SilentTransform) -> VerticutResult<Vec<TempCleanupWarning>> {
        self.transition(RunState::ExtractingAudio);
        if !silent.source.has_audio {
            return Err(VerticutError::audio_extract(
                format!(
                    "source '{}' has no audio track",
                    self.config.source.display()
                ),
                "",
            ));
        }
        ensure_parent_dir(&self.temp.audio)
            .map_err(|e| VerticutError::audio_extract(e.to_string(), ""))?;
        let out = self
            .transcoder
            .extract_audio(&self.config.source, &self.temp.audio)?;
        log_collaborator("extract", &out);

        self.transition(RunState::Merging);
        ensure_parent_dir(&self.config.output)
            .map_err(|e| VerticutError::merge(e.to_string(), ""))?;
        let out = self
            .transcoder
            .mux(&silent.video, &self.temp.audio, &self.config.output)?;
        log_collaborator("merge", &out);

        self.transition(RunState::Cleanup);
        Ok(remove_temp_files(&self.temp))
    }

    fn transition(&mut self, next: RunState) {
        tracing::debug!(from = ?self.state, to = ?next, "pipeline state");
        self.state = next;
    }
}

/// Run the per-frame loop; returns the number of frames written.
fn drive_frames(
    source: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
    layout: &LayerLayout,
    geometry: &TargetGeometry,
    progress_interval: u64,
    total: Option<u64>,
) -> VerticutResult<u64> {
    let source_dims = (source.info().width, source.info().height);
    let mut index = 0u64;
    loop {
        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => return Err(VerticutError::frame(index, e)),
        };

        let composited = if (frame.width, frame.height) == source_dims {
            composite_with_layout(&frame, layout, geometry)
        } else {
            composite_frame(&frame, geometry)
        }
        .map_err(|e| VerticutError::frame(index, e))?;

        sink.push_frame(FrameIndex(index), &composited)
            .map_err(|e| VerticutError::frame(index, e))?;
        index += 1;

        if progress_interval > 0 && index.is_multiple_of(progress_interval) {
            match total {
                Some(total) => tracing::info!("processed frames: {index}/{total}"),
                None => tracing::info!("processed frames: {index}"),
            }
        }
    }
    Ok(index)
}

fn log_collaborator(step: &str, out: &TranscodeOutput) {
    if !out.stdout.is_empty() {
        tracing::debug!(step, stdout = %out.stdout, "transcoder output");
    }
    if !out.stderr.is_empty() {
        tracing::debug!(step, stderr = %out.stderr, "transcoder diagnostics");
    }
}

/// Best-effort deletion of both temp artifacts.
pub fn remove_temp_files(temp: &TempPaths) -> Vec<TempCleanupWarning> {
    let mut warnings = Vec::new();
    for path in [&temp.video, &temp.audio] {
        match std::fs::remove_file(path) {
            Ok(()) => tracing::debug!(path = %path.display(), "removed temp file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                let warning = TempCleanupWarning {
                    path: path.clone(),
                    error: e.to_string(),
                };
                tracing::warn!("{warning}");
                warnings.push(warning);
            }
        }
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleanup_ignores_missing_files_and_removes_present_ones() {
        let dir = tempfile::tempdir().unwrap();
        let temp = TempPaths {
            video: dir.path().join("v.mp4"),
            audio: dir.path().join("a.mka"),
        };
        std::fs::write(&temp.video, b"x").unwrap();
        let warnings = remove_temp_files(&temp);
        assert!(warnings.is_empty());
        assert!(!temp.video.exists());
    }

    #[test]
    fn cleanup_failure_is_a_warning() {
        let dir = tempfile::tempdir().unwrap();
        // remove_file on a directory fails without NotFound.
        let blocker = dir.path().join("blocker");
        std::fs::create_dir(&blocker).unwrap();
        let temp = TempPaths {
            video: blocker.clone(),
            audio: dir.path().join("a.mka"),
        };
        let warnings = remove_temp_files(&temp);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].path, blocker);
        assert!(warnings[0].to_string().contains("failed to delete temp file"));
    }
}
