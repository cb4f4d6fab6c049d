use crate::foundation::error::{VerticutError, VerticutResult};

/// 0-based index of a frame in source decode order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32,
}

impl Fps {
    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> VerticutResult<Self> {
        if den == 0 {
            return Err(VerticutError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(VerticutError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Parse an ffmpeg-style ratio such as `30000/1001` or a bare integer such as `25`.
    pub fn parse_ratio(s: &str) -> VerticutResult<Self> {
        let s = s.trim();
        let (num, den) = match s.split_once('/') {
            Some((n, d)) => (n.trim(), d.trim()),
            None => (s, "1"),
        };
        let num = num
            .parse::<u32>()
            .map_err(|_| VerticutError::validation(format!("invalid frame rate '{s}'")))?;
        let den = den
            .parse::<u32>()
            .map_err(|_| VerticutError::validation(format!("invalid frame rate '{s}'")))?;
        Self::new(num, den)
    }

    /// Convert to floating-point FPS.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Convert seconds to a frame count, rounding to the nearest frame.
    pub fn secs_to_frames_round(self, secs: f64) -> u64 {
        (secs * self.as_f64()).round().max(0.0) as u64
    }
}

impl std::fmt::Display for Fps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Output canvas dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_rejects_zero_parts() {
        assert!(Fps::new(0, 1).is_err());
        assert!(Fps::new(30, 0).is_err());
        assert_eq!(Fps::new(30, 1).unwrap().as_f64(), 30.0);
    }

    #[test]
    fn parse_ratio_accepts_ffprobe_forms() {
        assert_eq!(Fps::parse_ratio("30/1").unwrap(), Fps { num: 30, den: 1 });
        assert_eq!(
            Fps::parse_ratio("30000/1001").unwrap(),
            Fps {
                num: 30000,
                den: 1001
            }
        );
        assert_eq!(Fps::parse_ratio("25").unwrap(), Fps { num: 25, den: 1 });
        assert!(Fps::parse_ratio("0/0").is_err());
        assert!(Fps::parse_ratio("abc").is_err());
    }

    #[test]
    fn secs_to_frames_rounds() {
        let fps = Fps::new(30, 1).unwrap();
        assert_eq!(fps.secs_to_frames_round(0.333_333), 10);
        assert_eq!(fps.secs_to_frames_round(-1.0), 0);
        assert_eq!(fps.to_string(), "30/1");
    }
}
