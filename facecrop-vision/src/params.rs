use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AlignError, Result};
use crate::landmarks::{Landmarks, DEFAULT_MEAN_LANDMARKS};

/// Transform family fitted between target and source landmarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignType {
    /// Rotation, uniform scale and translation (4 DOF).
    #[default]
    Similarity,
    /// General 2D affine map (6 DOF).
    Affine,
}

impl AlignType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Similarity => "similarity",
            Self::Affine => "affine",
        }
    }
}

impl FromStr for AlignType {
    type Err = AlignError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "similarity" => Ok(Self::Similarity),
            "affine" => Ok(Self::Affine),
            other => Err(AlignError::invalid(format!(
                "only 'similarity' or 'affine' transform is allowed, got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for AlignType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interpolation kernel, addressed by order 0..=5.
///
/// Orders 4 and 5 both select the Lanczos kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Interpolation {
    Nearest,
    Linear,
    /// Area averaging; for warps this degenerates to bilinear sampling.
    Area,
    #[default]
    Cubic,
    Lanczos4,
}

impl Interpolation {
    pub fn order(self) -> u8 {
        match self {
            Self::Nearest => 0,
            Self::Linear => 1,
            Self::Area => 2,
            Self::Cubic => 3,
            Self::Lanczos4 => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Linear => "linear",
            Self::Area => "area",
            Self::Cubic => "cubic",
            Self::Lanczos4 => "lanczos4",
        }
    }
}

impl TryFrom<u8> for Interpolation {
    type Error = AlignError;

    fn try_from(order: u8) -> Result<Self> {
        match order {
            0 => Ok(Self::Nearest),
            1 => Ok(Self::Linear),
            2 => Ok(Self::Area),
            3 => Ok(Self::Cubic),
            4 | 5 => Ok(Self::Lanczos4),
            other => Err(AlignError::invalid(format!(
                "interpolation order must be in 0..=5, got {other}"
            ))),
        }
    }
}

impl From<Interpolation> for u8 {
    fn from(value: Interpolation) -> Self {
        value.order()
    }
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How samples outside the source image are filled, both when padding the
/// canvas and when resampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorderMode {
    /// Zero fill.
    Constant,
    /// Replicate the edge pixel: `aaa|abcd|ddd`.
    #[default]
    Edge,
    /// Mirror including the edge pixel: `cba|abcd|dcb`.
    Symmetric,
    /// Mirror excluding the edge pixel: `dcb|abcd|cba`.
    Reflect,
    /// Periodic repetition: `bcd|abcd|abc`.
    Wrap,
}

impl BorderMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Constant => "constant",
            Self::Edge => "edge",
            Self::Symmetric => "symmetric",
            Self::Reflect => "reflect",
            Self::Wrap => "wrap",
        }
    }

    /// Map a possibly out-of-range index onto `0..len`.
    ///
    /// Returns `None` for [`BorderMode::Constant`] when the index falls
    /// outside the image; the caller fills with zero.
    pub fn fold(self, index: isize, len: usize) -> Option<usize> {
        debug_assert!(len > 0);
        let n = len as isize;
        if (0..n).contains(&index) {
            return Some(index as usize);
        }
        let folded = match self {
            Self::Constant => return None,
            Self::Edge => index.clamp(0, n - 1),
            Self::Wrap => index.rem_euclid(n),
            Self::Symmetric => {
                let m = index.rem_euclid(2 * n);
                if m < n {
                    m
                } else {
                    2 * n - 1 - m
                }
            }
            Self::Reflect => {
                if n == 1 {
                    0
                } else {
                    let period = 2 * n - 2;
                    let m = index.rem_euclid(period);
                    if m < n {
                        m
                    } else {
                        period - m
                    }
                }
            }
        };
        Some(folded as usize)
    }
}

impl FromStr for BorderMode {
    type Err = AlignError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "constant" => Ok(Self::Constant),
            "edge" => Ok(Self::Edge),
            "symmetric" => Ok(Self::Symmetric),
            "reflect" => Ok(Self::Reflect),
            "wrap" => Ok(Self::Wrap),
            other => Err(AlignError::invalid(format!(
                "border mode must be one of constant, edge, symmetric, reflect, wrap; got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for BorderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which points are handed to the transform estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Correspondence {
    /// The five landmarks themselves.
    #[default]
    Landmarks,
    /// Triangle-centroid points derived from the landmarks,
    /// see [`Landmarks::mid_points`].
    MidPoints,
}

impl Correspondence {
    pub fn apply(self, landmarks: &Landmarks) -> Landmarks {
        match self {
            Self::Landmarks => *landmarks,
            Self::MidPoints => landmarks.mid_points(),
        }
    }
}

impl FromStr for Correspondence {
    type Err = AlignError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "landmarks" => Ok(Self::Landmarks),
            "mid_points" | "midpoints" => Ok(Self::MidPoints),
            other => Err(AlignError::invalid(format!(
                "correspondence must be 'landmarks' or 'mid_points', got '{other}'"
            ))),
        }
    }
}

/// Parameters of one alignment call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignParams {
    /// Side of the square output.
    pub crop_size: usize,
    /// Fraction of the output occupied by the face.
    pub face_factor: f64,
    /// Fraction of the face region occupied by the landmark spread.
    pub landmark_factor: f64,
    pub align_type: AlignType,
    pub order: Interpolation,
    pub border: BorderMode,
    /// Canonical shape the face is aligned toward.
    pub mean_landmarks: Landmarks,
    pub correspondence: Correspondence,
}

impl Default for AlignParams {
    fn default() -> Self {
        Self {
            crop_size: 512,
            face_factor: 0.65,
            landmark_factor: 0.35,
            align_type: AlignType::Similarity,
            order: Interpolation::Cubic,
            border: BorderMode::Edge,
            mean_landmarks: DEFAULT_MEAN_LANDMARKS,
            correspondence: Correspondence::Landmarks,
        }
    }
}

impl AlignParams {
    pub fn validate(&self) -> Result<()> {
        if self.crop_size == 0 {
            return Err(AlignError::invalid("crop_size must be positive"));
        }
        for (name, value) in [
            ("face_factor", self.face_factor),
            ("landmark_factor", self.landmark_factor),
        ] {
            if !(value.is_finite() && value > 0.0 && value <= 1.0) {
                return Err(AlignError::invalid(format!(
                    "{name} must be in (0, 1], got {value}"
                )));
            }
        }
        self.mean_landmarks.validate()
    }

    /// Scale applied to the normalized mean shape.
    pub fn landmark_scale(&self) -> f64 {
        self.crop_size as f64 * self.face_factor * self.landmark_factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reference_vocabulary() {
        assert_eq!("affine".parse::<AlignType>().unwrap(), AlignType::Affine);
        assert_eq!("wrap".parse::<BorderMode>().unwrap(), BorderMode::Wrap);
        assert!(matches!(
            "projective".parse::<AlignType>(),
            Err(AlignError::InvalidArgument(_))
        ));
        assert!(matches!(
            "mirror".parse::<BorderMode>(),
            Err(AlignError::InvalidArgument(_))
        ));
    }

    #[test]
    fn orders_four_and_five_alias() {
        assert_eq!(Interpolation::try_from(4u8).unwrap(), Interpolation::Lanczos4);
        assert_eq!(Interpolation::try_from(5u8).unwrap(), Interpolation::Lanczos4);
        assert_eq!(Interpolation::try_from(2u8).unwrap(), Interpolation::Area);
        assert!(Interpolation::try_from(6u8).is_err());
    }

    #[test]
    fn fold_matches_padding_conventions() {
        // abcd = 0 1 2 3
        let idx = |mode: BorderMode| -> Vec<Option<usize>> {
            (-3..7).map(|i| mode.fold(i, 4)).collect()
        };
        let some = |v: &[usize]| v.iter().map(|&x| Some(x)).collect::<Vec<_>>();
        assert_eq!(idx(BorderMode::Edge), some(&[0, 0, 0, 0, 1, 2, 3, 3, 3, 3]));
        assert_eq!(idx(BorderMode::Wrap), some(&[1, 2, 3, 0, 1, 2, 3, 0, 1, 2]));
        assert_eq!(idx(BorderMode::Symmetric), some(&[2, 1, 0, 0, 1, 2, 3, 3, 2, 1]));
        assert_eq!(idx(BorderMode::Reflect), some(&[3, 2, 1, 0, 1, 2, 3, 2, 1, 0]));
        assert_eq!(BorderMode::Constant.fold(-1, 4), None);
        assert_eq!(BorderMode::Constant.fold(2, 4), Some(2));
    }

    #[test]
    fn fold_single_pixel_axis() {
        for mode in [BorderMode::Edge, BorderMode::Symmetric, BorderMode::Reflect, BorderMode::Wrap] {
            assert_eq!(mode.fold(-5, 1), Some(0));
            assert_eq!(mode.fold(9, 1), Some(0));
        }
    }

    #[test]
    fn validate_rejects_bad_params() {
        assert!(AlignParams::default().validate().is_ok());
        let zero = AlignParams { crop_size: 0, ..Default::default() };
        assert!(matches!(zero.validate(), Err(AlignError::InvalidArgument(_))));
        let big = AlignParams { face_factor: 1.5, ..Default::default() };
        assert!(big.validate().is_err());
        let nan = AlignParams { landmark_factor: f64::NAN, ..Default::default() };
        assert!(nan.validate().is_err());
        let full = AlignParams { face_factor: 1.0, landmark_factor: 1.0, ..Default::default() };
        assert!(full.validate().is_ok());
    }
}
