//! Run configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::ffmpeg::FfmpegTools;
use crate::foundation::error::{VerticutError, VerticutResult};
use crate::geometry::TargetGeometry;

/// Immutable configuration of one pipeline run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Source video.
    pub source: PathBuf,
    /// Final deliverable (video + audio).
    pub output: PathBuf,
    /// Explicit silent-intermediate path. Generated per run when unset.
    pub temp_video: Option<PathBuf>,
    /// Explicit extracted-audio path. Generated per run when unset.
    pub temp_audio: Option<PathBuf>,
    /// Directory for generated temp paths. Defaults to the output's directory.
    pub temp_dir: Option<PathBuf>,
    pub geometry: TargetGeometry,
    /// Log progress every N frames; 0 disables progress lines.
    pub progress_interval: u64,
    /// Overwrite `output` if it exists.
    pub overwrite: bool,
    pub tools: FfmpegTools,
    /// Upper bound on each audio extract / merge invocation. Unset waits indefinitely.
    pub collaborator_timeout_secs: Option<f64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("input_video.mp4"),
            output: PathBuf::from("output_9_16_short.mp4"),
            temp_video: None,
            temp_audio: None,
            temp_dir: None,
            geometry: TargetGeometry::default(),
            progress_interval: 30,
            overwrite: true,
            tools: FfmpegTools::default(),
            collaborator_timeout_secs: None,
        }
    }
}

/// Resolved temporary artifact paths of one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TempPaths {
    pub video: PathBuf,
    pub audio: PathBuf,
}

impl PipelineConfig {
    pub fn new(source: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            output: output.into(),
            ..Self::default()
        }
    }

    /// Load a JSON config file; missing fields take their defaults.
    pub fn load_json(path: &Path) -> VerticutResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_str(&text)
            .with_context(|| format!("parse config '{}'", path.display()))?;
        Ok(cfg)
    }

    pub fn collaborator_timeout(&self) -> Option<Duration> {
        self.collaborator_timeout_secs
            .filter(|t| t.is_finite() && *t > 0.0)
            .map(Duration::from_secs_f64)
    }

    pub fn validate(&self) -> VerticutResult<()> {
        self.geometry.validate()?;
        if self.source.as_os_str().is_empty() || self.output.as_os_str().is_empty() {
            return Err(VerticutError::validation(
                "source and output paths must be set",
            ));
        }
        if self.source == self.output {
            return Err(VerticutError::validation(
                "output path must differ from the source path",
            ));
        }
        if let Some(t) = self.collaborator_timeout_secs
            && (!t.is_finite() || t <= 0.0)
        {
            return Err(VerticutError::validation(
                "collaborator timeout must be a positive number of seconds",
            ));
        }
        for temp in [&self.temp_video, &self.temp_audio].into_iter().flatten() {
            if *temp == self.source || *temp == self.output {
                return Err(VerticutError::validation(format!(
                    "temp path '{}' collides with the source or output",
                    temp.display()
                )));
            }
        }
        if let (Some(v), Some(a)) = (&self.temp_video, &self.temp_audio)
            && v == a
        {
            return Err(VerticutError::validation(
                "temp video and temp audio paths must differ",
            ));
        }
        Ok(())
    }

    /// Temp paths for a run; generated names embed `run_id` so concurrent runs do not collide.
    pub fn temp_paths(&self, run_id: &str) -> TempPaths {
        let dir = self.temp_dir.clone().unwrap_or_else(|| {
            self.output
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        });
        let stem = self
            .output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());

        TempPaths {
            video: self
                .temp_video
                .clone()
                .unwrap_or_else(|| dir.join(format!(".{stem}.verticut-{run_id}.silent.mp4"))),
            // Matroska accepts nearly any audio codec, so stream copy never needs a re-encode.
            audio: self
                .temp_audio
                .clone()
                .unwrap_or_else(|| dir.join(format!(".{stem}.verticut-{run_id}.audio.mka"))),
        }
    }
}

/// Identifier unique to this process and moment, used to namespace temp files.
pub fn new_run_id() -> String {
    format!(
        "{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_paths() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.source, PathBuf::from("input_video.mp4"));
        assert_eq!(cfg.output, PathBuf::from("output_9_16_short.mp4"));
        assert_eq!(cfg.progress_interval, 30);
        cfg.validate().unwrap();
    }

    #[test]
    fn generated_temp_paths_are_namespaced() {
        let cfg = PipelineConfig::new("in.mp4", "out/final.mp4");
        let a = cfg.temp_paths("1-1");
        let b = cfg.temp_paths("1-2");
        assert_ne!(a.video, b.video);
        assert_ne!(a.audio, b.audio);
        assert!(a.video.starts_with("out"));
        assert!(a.video.to_string_lossy().ends_with(".silent.mp4"));
        assert!(a.audio.to_string_lossy().ends_with(".audio.mka"));
    }

    #[test]
    fn explicit_temp_paths_win() {
        let cfg = PipelineConfig {
            temp_video: Some("temp_video.mp4".into()),
            temp_audio: Some("temp_audio.aac".into()),
            ..PipelineConfig::new("in.mp4", "out.mp4")
        };
        let t = cfg.temp_paths("x");
        assert_eq!(t.video, PathBuf::from("temp_video.mp4"));
        assert_eq!(t.audio, PathBuf::from("temp_audio.aac"));
    }

    #[test]
    fn validate_rejects_colliding_paths() {
        assert!(PipelineConfig::new("a.mp4", "a.mp4").validate().is_err());
        let cfg = PipelineConfig {
            temp_video: Some("out.mp4".into()),
            ..PipelineConfig::new("in.mp4", "out.mp4")
        };
        assert!(cfg.validate().is_err());
        let cfg = PipelineConfig {
            collaborator_timeout_secs: Some(0.0),
            ..PipelineConfig::new("in.mp4", "out.mp4")
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn json_config_fills_missing_fields_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        std::fs::write(
            &path,
            r#"{"source": "clip.mov", "geometry": {"blur_kernel": 31}}"#,
        )
        .unwrap();
        let cfg = PipelineConfig::load_json(&path).unwrap();
        assert_eq!(cfg.source, PathBuf::from("clip.mov"));
        assert_eq!(cfg.geometry.blur_kernel, 31);
        assert_eq!(cfg.geometry.width, 1080);
        assert_eq!(cfg.output, PathBuf::from("output_9_16_short.mp4"));
    }

    #[test]
    fn run_ids_differ() {
        let a = new_run_id();
        std::thread::sleep(Duration::from_millis(1));
        assert_ne!(a, new_run_id());
    }
}
