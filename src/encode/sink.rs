use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::{VerticutError, VerticutResult};
use crate::frame::Frame;

/// Encoding parameters of the silent output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output frames-per-second, taken from the source.
    pub fps: Fps,
}

impl SinkConfig {
    pub fn validate(&self) -> VerticutResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(VerticutError::validation(
                "sink width/height must be non-zero",
            ));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            return Err(VerticutError::validation(
                "sink width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        if self.fps.num == 0 || self.fps.den == 0 {
            return Err(VerticutError::validation("sink fps must be non-zero"));
        }
        Ok(())
    }
}

/// Append-only consumer of composited frames.
///
/// Ordering contract: `push_frame` is called in strictly increasing `FrameIndex` order.
pub trait FrameSink {
    /// Append one frame.
    fn push_frame(&mut self, idx: FrameIndex, frame: &Frame) -> VerticutResult<()>;
    /// Flush and finalize the stream. Safe to call more than once.
    fn finish(&mut self) -> VerticutResult<()>;
}

/// Shared frame checks for sinks: started, in order, right size.
pub(crate) fn check_frame(
    cfg: &SinkConfig,
    last_idx: &mut Option<FrameIndex>,
    idx: FrameIndex,
    frame: &Frame,
) -> VerticutResult<()> {
    if let Some(last) = *last_idx
        && idx <= last
    {
        return Err(VerticutError::media("sink received out-of-order frame index"));
    }
    if frame.width != cfg.width || frame.height != cfg.height {
        return Err(VerticutError::validation(format!(
            "frame size mismatch: got {}x{}, expected {}x{}",
            frame.width, frame.height, cfg.width, cfg.height
        )));
    }
    *last_idx = Some(idx);
    Ok(())
}

/// In-memory sink for tests and debugging.
#[derive(Debug)]
pub struct InMemorySink {
    cfg: SinkConfig,
    last_idx: Option<FrameIndex>,
    finished: bool,
    /// Frames in push order.
    pub(crate) frames: Vec<(FrameIndex, Frame)>,
}

impl InMemorySink {
    pub fn new(cfg: SinkConfig) -> Self {
        Self {
            cfg,
            last_idx: None,
            finished: false,
            frames: Vec::new(),
        }
    }

    pub fn config(&self) -> SinkConfig {
        self.cfg
    }

    /// Borrow the captured frames.
    pub fn frames(&self) -> &[(FrameIndex, Frame)] {
        &self.frames
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl FrameSink for InMemorySink {
    fn push_frame(&mut self, idx: FrameIndex, frame: &Frame) -> VerticutResult<()> {
        if self.finished {
            return Err(VerticutError::media("sink is already finalized"));
        }
        check_frame(&self.cfg, &mut self.last_idx, idx, frame)?;
        self.frames.push((idx, frame.clone()));
        Ok(())
    }

    fn finish(&mut self) -> VerticutResult<()> {
        self.finished = true;
        Ok(())
    }
}
