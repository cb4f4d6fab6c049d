#![forbid(unsafe_code)]

pub mod blur_cpu;
pub mod compositor;
pub mod config;
pub mod encode;
pub mod ffmpeg;
pub mod foundation;
pub mod frame;
pub mod geometry;
pub mod media;
pub mod pipeline;
pub mod report;
pub mod transcode;

pub use compositor::{composite_frame, composite_with_layout};
pub use config::{PipelineConfig, TempPaths};
pub use encode::ffmpeg::FfmpegSink;
pub use encode::sink::{FrameSink, InMemorySink, SinkConfig};
pub use ffmpeg::FfmpegTools;
pub use foundation::core::{Canvas, Fps, FrameIndex};
pub use foundation::error::{VerticutError, VerticutResult};
pub use frame::Frame;
pub use geometry::{AspectRatio, LayerLayout, LayerPlacement, TargetGeometry};
pub use media::probe::{SourceInfo, probe_source};
pub use media::source::{FfmpegSource, FrameSource, InMemorySource};
pub use media::{FfmpegMedia, MediaBackend};
pub use pipeline::{Pipeline, RunState, RunSummary, TempCleanupWarning};
pub use report::{CapturingReporter, ClipboardReporter, FailureReporter, NoopReporter};
pub use transcode::{FfmpegTranscoder, TranscodeOutput, Transcoder};
