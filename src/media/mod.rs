//! Source decoding and the media seam the pipeline opens streams through.

use std::path::Path;

use crate::encode::ffmpeg::FfmpegSink;
use crate::encode::sink::{FrameSink, SinkConfig};
use crate::ffmpeg::FfmpegTools;
use crate::foundation::error::VerticutResult;

/// `ffprobe` source inspection.
pub mod probe;
/// Frame source trait, the ffmpeg decoder and the in-memory source.
pub mod source;

use source::{FfmpegSource, FrameSource};

/// Opens the source and sink streams of one run.
///
/// `open_source` must fail with `SourceOpen` and `open_sink` with `SinkOpen`.
pub trait MediaBackend {
    fn open_source(&mut self, path: &Path) -> VerticutResult<Box<dyn FrameSource>>;
    fn open_sink(&mut self, path: &Path, cfg: SinkConfig) -> VerticutResult<Box<dyn FrameSink>>;
}

/// Media backend backed by the system `ffmpeg` / `ffprobe`.
#[derive(Clone, Debug, Default)]
pub struct FfmpegMedia {
    pub tools: FfmpegTools,
}

impl FfmpegMedia {
    pub fn new(tools: FfmpegTools) -> Self {
        Self { tools }
    }
}

impl MediaBackend for FfmpegMedia {
    fn open_source(&mut self, path: &Path) -> VerticutResult<Box<dyn FrameSource>> {
        Ok(Box::new(FfmpegSource::open(&self.tools, path)?))
    }

    fn open_sink(&mut self, path: &Path, cfg: SinkConfig) -> VerticutResult<Box<dyn FrameSink>> {
        Ok(Box::new(FfmpegSink::open(&self.tools, path, cfg)?))
    }
}
