//! Five-point landmark sets and the canonical mean shape.
//!
//! Point order is fixed: left eye, right eye, nose, left mouth corner,
//! right mouth corner. Every operation here returns a new set; inputs are
//! never modified.

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use crate::error::{AlignError, Result};

pub const LANDMARK_COUNT: usize = 5;

pub const LANDMARK_NAMES: [&str; LANDMARK_COUNT] =
    ["left eye", "right eye", "nose", "left mouth", "right mouth"];

/// Canonical mean shape in a normalized frame, roughly within [-0.5, 0.5].
pub const DEFAULT_MEAN_LANDMARKS: Landmarks = Landmarks::new([
    [-0.46911814, -0.51348481],
    [0.45750203, -0.53173911],
    [-0.00499168, 0.06126145],
    [-0.40616926, 0.46826089],
    [0.42776873, 0.45444013],
]);

/// Relative determinant below which a point cloud counts as collinear.
const COLLINEAR_EPS: f64 = 1e-10;

/// Ordered set of five 2D points `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Landmarks([[f64; 2]; LANDMARK_COUNT]);

impl Landmarks {
    pub const fn new(points: [[f64; 2]; LANDMARK_COUNT]) -> Self {
        Self(points)
    }

    /// Build from a slice of points, rejecting anything but five finite points.
    pub fn from_points(points: &[[f64; 2]]) -> Result<Self> {
        let points: [[f64; 2]; LANDMARK_COUNT] = points.try_into().map_err(|_| {
            AlignError::invalid(format!(
                "expected {LANDMARK_COUNT} landmarks, got {}",
                points.len()
            ))
        })?;
        let landmarks = Self(points);
        landmarks.validate()?;
        Ok(landmarks)
    }

    /// Build from interleaved coordinates `x1, y1, x2, y2, ..., x5, y5`,
    /// the layout detectors usually emit.
    pub fn from_flat<T: Copy + Into<f64>>(coords: &[T]) -> Result<Self> {
        if coords.len() != LANDMARK_COUNT * 2 {
            return Err(AlignError::invalid(format!(
                "expected {} landmark coordinates, got {}",
                LANDMARK_COUNT * 2,
                coords.len()
            )));
        }
        let mut points = [[0.0; 2]; LANDMARK_COUNT];
        for (point, pair) in points.iter_mut().zip(coords.chunks_exact(2)) {
            *point = [pair[0].into(), pair[1].into()];
        }
        Self::from_points(&points)
    }

    /// Build from a `5 × 2` array view.
    pub fn from_array(view: ArrayView2<f64>) -> Result<Self> {
        if view.dim() != (LANDMARK_COUNT, 2) {
            return Err(AlignError::invalid(format!(
                "landmark array must have shape ({LANDMARK_COUNT}, 2), got {:?}",
                view.dim()
            )));
        }
        let points: Vec<[f64; 2]> = view.rows().into_iter().map(|r| [r[0], r[1]]).collect();
        Self::from_points(&points)
    }

    pub fn points(&self) -> &[[f64; 2]; LANDMARK_COUNT] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f64; 2]> {
        self.0.iter()
    }

    pub fn left_eye(&self) -> [f64; 2] {
        self.0[0]
    }

    pub fn right_eye(&self) -> [f64; 2] {
        self.0[1]
    }

    pub fn nose(&self) -> [f64; 2] {
        self.0[2]
    }

    pub fn left_mouth(&self) -> [f64; 2] {
        self.0[3]
    }

    pub fn right_mouth(&self) -> [f64; 2] {
        self.0[4]
    }

    pub fn eye_midpoint(&self) -> [f64; 2] {
        let (l, r) = (self.left_eye(), self.right_eye());
        [(l[0] + r[0]) / 2.0, (l[1] + r[1]) / 2.0]
    }

    /// Rejects NaN and infinite coordinates.
    pub fn validate(&self) -> Result<()> {
        for (name, p) in LANDMARK_NAMES.iter().zip(self.iter()) {
            if !p[0].is_finite() || !p[1].is_finite() {
                return Err(AlignError::invalid(format!(
                    "{name} landmark is not finite: ({}, {})",
                    p[0], p[1]
                )));
            }
        }
        Ok(())
    }

    /// Recenter so the midpoint between the eyes is the origin.
    pub fn normalized(&self) -> Self {
        let [cx, cy] = self.eye_midpoint();
        self.map(|[x, y]| [x - cx, y - cy])
    }

    /// Uniform scale followed by a translation.
    pub fn projected(&self, scale: f64, offset: [f64; 2]) -> Self {
        self.map(|[x, y]| [x * scale + offset[0], y * scale + offset[1]])
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        self.map(|[x, y]| [x + dx, y + dy])
    }

    /// Five derived points `[left, right, top, bottom, mid]` built from
    /// triangle centroids of the landmark layout.
    pub fn mid_points(&self) -> Self {
        let centroid = |a: [f64; 2], b: [f64; 2], c: [f64; 2]| {
            [(a[0] + b[0] + c[0]) / 3.0, (a[1] + b[1] + c[1]) / 3.0]
        };
        let (le, re, nose, lm, rm) = (
            self.left_eye(),
            self.right_eye(),
            self.nose(),
            self.left_mouth(),
            self.right_mouth(),
        );
        let left = centroid(le, nose, lm);
        let right = centroid(re, nose, rm);
        let top = centroid(le, nose, re);
        let bottom = centroid(lm, nose, rm);
        let top_mid = centroid(top, left, right);
        let bottom_mid = centroid(bottom, left, right);
        let mid = [
            (top_mid[0] + bottom_mid[0]) / 2.0,
            (top_mid[1] + bottom_mid[1]) / 2.0,
        ];
        Self([left, right, top, bottom, mid])
    }

    /// True when all points lie on one line (or coincide).
    pub fn is_collinear(&self) -> bool {
        let n = LANDMARK_COUNT as f64;
        let mx = self.iter().map(|p| p[0]).sum::<f64>() / n;
        let my = self.iter().map(|p| p[1]).sum::<f64>() / n;
        let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
        for p in self.iter() {
            let (dx, dy) = (p[0] - mx, p[1] - my);
            sxx += dx * dx;
            syy += dy * dy;
            sxy += dx * dy;
        }
        let trace = sxx + syy;
        if trace <= f64::MIN_POSITIVE {
            return true;
        }
        sxx * syy - sxy * sxy <= COLLINEAR_EPS * trace * trace
    }

    fn map(&self, f: impl Fn([f64; 2]) -> [f64; 2]) -> Self {
        Self(self.0.map(f))
    }
}

impl Default for Landmarks {
    fn default() -> Self {
        DEFAULT_MEAN_LANDMARKS
    }
}

impl From<[[f64; 2]; LANDMARK_COUNT]> for Landmarks {
    fn from(points: [[f64; 2]; LANDMARK_COUNT]) -> Self {
        Self(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn normalized_moves_eye_midpoint_to_origin() {
        let normalized = DEFAULT_MEAN_LANDMARKS.normalized();
        let [cx, cy] = normalized.eye_midpoint();
        assert_abs_diff_eq!(cx, 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!(cy, 0.0, epsilon = 1e-15);
        // nose keeps its position relative to the eyes
        let before = DEFAULT_MEAN_LANDMARKS.nose()[1] - DEFAULT_MEAN_LANDMARKS.eye_midpoint()[1];
        assert_abs_diff_eq!(normalized.nose()[1], before, epsilon = 1e-15);
    }

    #[test]
    fn normalized_leaves_input_untouched() {
        let mean = DEFAULT_MEAN_LANDMARKS;
        let _ = mean.normalized();
        assert_eq!(mean, DEFAULT_MEAN_LANDMARKS);
    }

    #[test]
    fn projected_scales_then_translates() {
        let lm = Landmarks::new([[1.0, 0.0], [0.0, 1.0], [-1.0, 0.0], [0.0, -1.0], [0.5, 0.5]]);
        let p = lm.projected(10.0, [100.0, 50.0]);
        assert_eq!(p.points()[0], [110.0, 50.0]);
        assert_eq!(p.points()[3], [100.0, 40.0]);
        assert_eq!(p.points()[4], [105.0, 55.0]);
    }

    #[test]
    fn from_flat_interleaves_xy() {
        let flat: [f32; 10] = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let lm = Landmarks::from_flat(&flat).unwrap();
        assert_eq!(lm.left_eye(), [1.0, 2.0]);
        assert_eq!(lm.right_mouth(), [9.0, 10.0]);
    }

    #[test]
    fn rejects_wrong_shapes() {
        assert!(matches!(
            Landmarks::from_points(&[[0.0, 0.0]; 4]),
            Err(AlignError::InvalidArgument(_))
        ));
        assert!(matches!(
            Landmarks::from_flat(&[0.0f64; 11]),
            Err(AlignError::InvalidArgument(_))
        ));
        let wrong = array![[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]];
        assert!(matches!(
            Landmarks::from_array(wrong.view()),
            Err(AlignError::InvalidArgument(_))
        ));
    }

    #[test]
    fn rejects_non_finite() {
        let mut points = *DEFAULT_MEAN_LANDMARKS.points();
        points[2][1] = f64::NAN;
        assert!(matches!(
            Landmarks::from_points(&points),
            Err(AlignError::InvalidArgument(_))
        ));
    }

    #[test]
    fn from_array_keeps_order() {
        let arr = array![[0.0, 1.0], [2.0, 3.0], [4.0, 5.0], [6.0, 7.0], [8.0, 9.0]];
        let lm = Landmarks::from_array(arr.view()).unwrap();
        assert_eq!(lm.nose(), [4.0, 5.0]);
    }

    #[test]
    fn collinear_detection() {
        assert!(!DEFAULT_MEAN_LANDMARKS.is_collinear());
        let line = Landmarks::new([[0.0, 0.0], [1.0, 2.0], [2.0, 4.0], [3.0, 6.0], [4.0, 8.0]]);
        assert!(line.is_collinear());
        let same = Landmarks::new([[3.0, 3.0]; 5]);
        assert!(same.is_collinear());
    }

    #[test]
    fn mid_points_of_symmetric_layout() {
        let lm = Landmarks::new([[-1.0, -1.0], [1.0, -1.0], [0.0, 0.0], [-1.0, 1.0], [1.0, 1.0]]);
        let mid = lm.mid_points();
        assert_abs_diff_eq!(mid.points()[0][0], -2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(mid.points()[1][0], 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(mid.points()[2][1], -2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(mid.points()[3][1], 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(mid.points()[4][0], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(mid.points()[4][1], 0.0, epsilon = 1e-12);
    }
}
