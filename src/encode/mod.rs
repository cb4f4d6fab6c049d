//! Silent-stream encoding.

/// `ffmpeg`-based sink (H.264 MP4 via system `ffmpeg`).
pub mod ffmpeg;
/// Frame sink trait and the in-memory sink.
pub mod sink;
