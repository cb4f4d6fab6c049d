use std::path::PathBuf;

pub type VerticutResult<T> = Result<T, VerticutError>;

#[derive(thiserror::Error, Debug)]
pub enum VerticutError {
    #[error("cannot open source video '{}': {reason}", path.display())]
    SourceOpen { path: PathBuf, reason: String },

    #[error("cannot open output stream '{}': {reason}", path.display())]
    SinkOpen { path: PathBuf, reason: String },

    #[error("frame geometry error: {0}")]
    FrameGeometry(String),

    #[error("frame {index} failed: {source}")]
    FrameProcessing {
        index: u64,
        #[source]
        source: Box<VerticutError>,
    },

    #[error("audio extraction failed: {message}\nstderr: {stderr}")]
    AudioExtract { message: String, stderr: String },

    #[error("audio/video merge failed: {message}\nstderr: {stderr}")]
    Merge { message: String, stderr: String },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("media error: {0}")]
    Media(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VerticutError {
    pub fn source_open(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::SourceOpen {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn sink_open(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::SinkOpen {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::FrameGeometry(msg.into())
    }

    pub fn frame(index: u64, cause: VerticutError) -> Self {
        Self::FrameProcessing {
            index,
            source: Box::new(cause),
        }
    }

    pub fn audio_extract(msg: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::AudioExtract {
            message: msg.into(),
            stderr: stderr.into(),
        }
    }

    pub fn merge(msg: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::Merge {
            message: msg.into(),
            stderr: stderr.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn media(msg: impl Into<String>) -> Self {
        Self::Media(msg.into())
    }

    /// Short stable name of the failure class, used in logs and the run state.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SourceOpen { .. } => "SourceOpenError",
            Self::SinkOpen { .. } => "SinkOpenError",
            Self::FrameGeometry(_) => "FrameGeometryError",
            Self::FrameProcessing { .. } => "FrameProcessingError",
            Self::AudioExtract { .. } => "AudioExtractError",
            Self::Merge { .. } => "MergeError",
            Self::Validation(_) => "ValidationError",
            Self::Media(_) => "MediaError",
            Self::Other(_) => "Error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            VerticutError::source_open("in.mp4", "missing")
                .to_string()
                .contains("cannot open source video 'in.mp4'")
        );
        assert!(
            VerticutError::geometry("x")
                .to_string()
                .contains("frame geometry error:")
        );
        assert!(
            VerticutError::validation("x")
                .to_string()
                .contains("validation error:")
        );
    }

    #[test]
    fn frame_error_carries_index_and_cause() {
        let err = VerticutError::frame(7, VerticutError::geometry("too narrow"));
        assert_eq!(err.kind(), "FrameProcessingError");
        let msg = err.to_string();
        assert!(msg.contains("frame 7"));
        assert!(msg.contains("too narrow"));

        let VerticutError::FrameProcessing { index, source } = err else {
            panic!("expected FrameProcessing");
        };
        assert_eq!(index, 7);
        assert_eq!(source.kind(), "FrameGeometryError");
    }

    #[test]
    fn collaborator_errors_keep_stderr() {
        let err = VerticutError::audio_extract("ffmpeg exited with status 1", "no audio stream");
        assert!(err.to_string().contains("no audio stream"));
        let err = VerticutError::merge("ffmpeg exited with status 1", "bad codec");
        assert!(err.to_string().contains("bad codec"));
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = VerticutError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
