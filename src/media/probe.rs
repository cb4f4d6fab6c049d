use std::path::{Path, PathBuf};
use std::process::Command;

use crate::ffmpeg::spawn_error;
use crate::foundation::core::Fps;
use crate::foundation::error::{VerticutError, VerticutResult};

/// Stream facts about a source video, read once before decoding starts.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceInfo {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: Fps,
    /// Total frame count when the container reports it (or it can be derived from duration).
    pub frame_count: Option<u64>,
    pub duration_sec: Option<f64>,
    pub has_audio: bool,
}

/// Probe `path` with `ffprobe`.
///
/// Every failure here means the source cannot be opened, so errors are `SourceOpen`.
pub fn probe_source(ffprobe: &Path, path: &Path) -> VerticutResult<SourceInfo> {
    if !path.is_file() {
        return Err(VerticutError::source_open(path, "file does not exist"));
    }

    let out = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path)
        .output()
        .map_err(|e| VerticutError::source_open(path, spawn_error(ffprobe, &e).to_string()))?;
    if !out.status.success() {
        return Err(VerticutError::source_open(
            path,
            format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            ),
        ));
    }

    parse_probe_json(path, &out.stdout)
}

#[derive(serde::Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
    tags: Option<ProbeTags>,
}

#[derive(serde::Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

#[derive(serde::Deserialize)]
struct ProbeTags {
    rotate: Option<String>,
}

impl ProbeStream {
    /// Display rotation in degrees, from the display matrix or the legacy `rotate` tag.
    fn rotation(&self) -> i64 {
        self.side_data_list
            .iter()
            .find_map(|sd| sd.rotation)
            .or_else(|| {
                self.tags
                    .as_ref()
                    .and_then(|t| t.rotate.as_deref())
                    .and_then(|r| r.trim().parse::<f64>().ok())
            })
            .filter(|r| r.is_finite())
            .map(|r| r.round() as i64)
            .unwrap_or(0)
    }
}

#[derive(serde::Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(serde::Deserialize)]
struct ProbeOut {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

pub(crate) fn parse_probe_json(path: &Path, json: &[u8]) -> VerticutResult<SourceInfo> {
    let parsed: ProbeOut = serde_json::from_slice(json)
        .map_err(|e| VerticutError::source_open(path, format!("ffprobe json parse failed: {e}")))?;

    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| VerticutError::source_open(path, "no video stream found"))?;
    let (stored_w, stored_h) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(VerticutError::source_open(
                path,
                "video stream has no usable dimensions",
            ));
        }
    };
    // The decoder applies the display rotation, so quarter turns swap the frame size.
    let rotation = video.rotation();
    let (width, height) = if rotation.rem_euclid(180) == 90 {
        (stored_h, stored_w)
    } else {
        (stored_w, stored_h)
    };

    // r_frame_rate is the container's base rate; avg_frame_rate covers streams where it is 0/0.
    let fps = [video.r_frame_rate.as_deref(), video.avg_frame_rate.as_deref()]
        .into_iter()
        .flatten()
        .find_map(|r| Fps::parse_ratio(r).ok())
        .ok_or_else(|| VerticutError::source_open(path, "video stream has no valid frame rate"))?;

    let duration_sec = video
        .duration
        .as_deref()
        .or_else(|| parsed.format.as_ref().and_then(|f| f.duration.as_deref()))
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0);

    let frame_count = video
        .nb_frames
        .as_deref()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|n| *n > 0)
        .or_else(|| duration_sec.map(|d| fps.secs_to_frames_round(d)));

    let has_audio = parsed
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    Ok(SourceInfo {
        path: path.to_path_buf(),
        width,
        height,
        fps,
        frame_count,
        duration_sec,
        has_audio,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {"codec_type": "video", "width": 1920, "height": 1080,
             "r_frame_rate": "30/1", "avg_frame_rate": "30/1", "nb_frames": "10",
             "duration": "0.333333"},
            {"codec_type": "audio", "duration": "0.341333"}
        ],
        "format": {"duration": "0.341333"}
    }"#;

    #[test]
    fn parses_video_and_audio_streams() {
        let info = parse_probe_json(Path::new("in.mp4"), SAMPLE.as_bytes()).unwrap();
        assert_eq!((info.width, info.height), (1920, 1080));
        assert_eq!(info.fps, Fps::new(30, 1).unwrap());
        assert_eq!(info.frame_count, Some(10));
        assert!(info.has_audio);
    }

    #[test]
    fn falls_back_to_avg_rate_and_duration_count() {
        let json = r#"{"streams": [{"codec_type": "video", "width": 640, "height": 360,
            "r_frame_rate": "0/0", "avg_frame_rate": "25/1"}],
            "format": {"duration": "2.0"}}"#;
        let info = parse_probe_json(Path::new("in.mkv"), json.as_bytes()).unwrap();
        assert_eq!(info.fps, Fps::new(25, 1).unwrap());
        assert_eq!(info.frame_count, Some(50));
        assert!(!info.has_audio);
    }

    #[test]
    fn portrait_phone_clip_reports_rotated_size() {
        let json = r#"{"streams": [{"codec_type": "video", "width": 1920, "height": 1080,
            "r_frame_rate": "30/1",
            "side_data_list": [{"side_data_type": "Display Matrix", "rotation": -90}]}]}"#;
        let info = parse_probe_json(Path::new("phone.mp4"), json.as_bytes()).unwrap();
        assert_eq!((info.width, info.height), (1080, 1920));
    }

    #[test]
    fn legacy_rotate_tag_and_half_turns() {
        let json = r#"{"streams": [{"codec_type": "video", "width": 1920, "height": 1080,
            "r_frame_rate": "30/1", "tags": {"rotate": "270"}}]}"#;
        let info = parse_probe_json(Path::new("old.mov"), json.as_bytes()).unwrap();
        assert_eq!((info.width, info.height), (1080, 1920));

        let json = r#"{"streams": [{"codec_type": "video", "width": 1920, "height": 1080,
            "r_frame_rate": "30/1", "side_data_list": [{"rotation": 180}]}]}"#;
        let info = parse_probe_json(Path::new("flipped.mp4"), json.as_bytes()).unwrap();
        assert_eq!((info.width, info.height), (1920, 1080));
    }

    #[test]
    fn audio_only_input_is_a_source_open_error() {
        let json = r#"{"streams": [{"codec_type": "audio"}]}"#;
        let err = parse_probe_json(Path::new("a.m4a"), json.as_bytes()).unwrap_err();
        assert!(matches!(err, VerticutError::SourceOpen { .. }));
    }

    #[test]
    fn missing_file_is_a_source_open_error() {
        let err = probe_source(Path::new("ffprobe"), Path::new("does/not/exist.mp4")).unwrap_err();
        assert!(matches!(err, VerticutError::SourceOpen { .. }));
    }
}
