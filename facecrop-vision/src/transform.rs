//! 2D affine transforms and their least-squares estimation from landmark
//! correspondences.
//!
//! The fit always uses every correspondence. `EstimateOptions` carries a
//! reprojection threshold, but it only classifies points for the returned
//! inlier mask; it never drops them from the fit.

use log::{debug, warn};
use nalgebra::{DMatrix, DVector, Matrix3, Vector3};
use serde::{Serialize, Serializer};

use crate::error::{AlignError, Result};
use crate::landmarks::{Landmarks, LANDMARK_COUNT};
use crate::params::AlignType;

/// Relative singular value cutoff used for rank decisions.
const RANK_EPS: f64 = 1e-12;

/// A 2×3 affine map stored as a 3×3 matrix with bottom row `[0, 0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    matrix: Matrix3<f64>,
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix3::identity(),
        }
    }

    /// `[[a, b, c], [d, e, f]]` maps `(x, y)` to `(ax + by + c, dx + ey + f)`.
    pub fn from_rows(rows: [[f64; 3]; 2]) -> Self {
        let [[a, b, c], [d, e, f]] = rows;
        Self {
            matrix: Matrix3::new(a, b, c, d, e, f, 0.0, 0.0, 1.0),
        }
    }

    pub fn rows(&self) -> [[f64; 3]; 2] {
        let m = &self.matrix;
        [
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
        ]
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    pub fn apply(&self, point: [f64; 2]) -> [f64; 2] {
        let v = self.matrix * Vector3::new(point[0], point[1], 1.0);
        [v[0], v[1]]
    }

    /// Determinant of the linear part.
    pub fn determinant(&self) -> f64 {
        let m = &self.matrix;
        m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)]
    }

    pub fn inverse(&self) -> Option<Self> {
        if self.determinant() == 0.0 {
            return None;
        }
        self.matrix.try_inverse().map(|matrix| Self { matrix })
    }

    pub fn is_finite(&self) -> bool {
        self.matrix.iter().all(|v| v.is_finite())
    }

    /// Element-wise comparison of the 2×3 part.
    pub fn abs_diff_le(&self, other: &Self, eps: f64) -> bool {
        self.rows()
            .iter()
            .flatten()
            .zip(other.rows().iter().flatten())
            .all(|(a, b)| (a - b).abs() <= eps)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Serialize for Transform {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.rows().serialize(serializer)
    }
}

/// Options handed to the estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimateOptions {
    /// Residual (pixels) above which a correspondence is flagged as an
    /// outlier in [`Estimate::inliers`]. Infinite by default, which flags
    /// nothing.
    pub reprojection_threshold: f64,
}

impl Default for EstimateOptions {
    fn default() -> Self {
        Self {
            reprojection_threshold: f64::INFINITY,
        }
    }
}

/// Fitted transform together with per-point diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Estimate {
    /// Maps target (canvas) coordinates onto source coordinates.
    pub transform: Transform,
    /// Distance between the mapped target and the source point.
    pub residuals: [f64; LANDMARK_COUNT],
    pub inliers: [bool; LANDMARK_COUNT],
}

impl Estimate {
    pub fn inlier_count(&self) -> usize {
        self.inliers.iter().filter(|&&b| b).count()
    }

    pub fn rms_error(&self) -> f64 {
        let sum: f64 = self.residuals.iter().map(|r| r * r).sum();
        (sum / LANDMARK_COUNT as f64).sqrt()
    }
}

/// Least-squares fit of a transform of family `kind` taking `target` onto
/// `source`.
pub fn estimate_transform(
    target: &Landmarks,
    source: &Landmarks,
    kind: AlignType,
    options: &EstimateOptions,
) -> Result<Estimate> {
    for (label, points) in [("target", target), ("source", source)] {
        if points.is_collinear() {
            return Err(AlignError::degenerate(format!(
                "{label} landmarks are collinear"
            )));
        }
    }

    let (design, rhs) = match kind {
        AlignType::Similarity => similarity_system(target, source),
        AlignType::Affine => affine_system(target, source),
    };
    let unknowns = design.ncols();
    let params = solve_least_squares(design, rhs)?;

    let transform = match kind {
        AlignType::Similarity => {
            let (a, b, tx, ty) = (params[0], params[1], params[2], params[3]);
            Transform::from_rows([[a, -b, tx], [b, a, ty]])
        }
        AlignType::Affine => Transform::from_rows([
            [params[0], params[1], params[2]],
            [params[3], params[4], params[5]],
        ]),
    };
    if !transform.is_finite() || transform.inverse().is_none() {
        return Err(AlignError::degenerate(format!(
            "estimated {kind} transform is not invertible"
        )));
    }

    let mut residuals = [0.0; LANDMARK_COUNT];
    let mut inliers = [false; LANDMARK_COUNT];
    for (i, (t, s)) in target.iter().zip(source.iter()).enumerate() {
        let [x, y] = transform.apply(*t);
        residuals[i] = (x - s[0]).hypot(y - s[1]);
        inliers[i] = residuals[i] <= options.reprojection_threshold;
    }

    let estimate = Estimate {
        transform,
        residuals,
        inliers,
    };
    debug!(
        "{kind} fit with {unknowns} unknowns: rms {:.4}px, {} / {LANDMARK_COUNT} inliers",
        estimate.rms_error(),
        estimate.inlier_count()
    );
    if estimate.inlier_count() < LANDMARK_COUNT {
        warn!(
            "{} landmark(s) exceed the reprojection threshold of {}px",
            LANDMARK_COUNT - estimate.inlier_count(),
            options.reprojection_threshold
        );
    }
    Ok(estimate)
}

/// Rows `[x, -y, 1, 0] -> u` and `[y, x, 0, 1] -> v` for unknowns
/// `(a, b, tx, ty)`.
fn similarity_system(target: &Landmarks, source: &Landmarks) -> (DMatrix<f64>, DVector<f64>) {
    let mut design = DMatrix::zeros(2 * LANDMARK_COUNT, 4);
    let mut rhs = DVector::zeros(2 * LANDMARK_COUNT);
    for (i, (t, s)) in target.iter().zip(source.iter()).enumerate() {
        let (x, y) = (t[0], t[1]);
        let r = 2 * i;
        design.row_mut(r).copy_from_slice(&[x, -y, 1.0, 0.0]);
        design.row_mut(r + 1).copy_from_slice(&[y, x, 0.0, 1.0]);
        rhs[r] = s[0];
        rhs[r + 1] = s[1];
    }
    (design, rhs)
}

/// Rows `[x, y, 1, 0, 0, 0] -> u` and `[0, 0, 0, x, y, 1] -> v`.
fn affine_system(target: &Landmarks, source: &Landmarks) -> (DMatrix<f64>, DVector<f64>) {
    let mut design = DMatrix::zeros(2 * LANDMARK_COUNT, 6);
    let mut rhs = DVector::zeros(2 * LANDMARK_COUNT);
    for (i, (t, s)) in target.iter().zip(source.iter()).enumerate() {
        let (x, y) = (t[0], t[1]);
        let r = 2 * i;
        design.row_mut(r).copy_from_slice(&[x, y, 1.0, 0.0, 0.0, 0.0]);
        design.row_mut(r + 1).copy_from_slice(&[0.0, 0.0, 0.0, x, y, 1.0]);
        rhs[r] = s[0];
        rhs[r + 1] = s[1];
    }
    (design, rhs)
}

fn solve_least_squares(design: DMatrix<f64>, rhs: DVector<f64>) -> Result<DVector<f64>> {
    let unknowns = design.ncols();
    let svd = design.svd(true, true);
    let cutoff = svd.singular_values.max() * RANK_EPS;
    if svd.rank(cutoff) < unknowns {
        return Err(AlignError::degenerate(
            "landmark correspondences are rank deficient",
        ));
    }
    svd.solve(&rhs, cutoff)
        .map_err(|e| AlignError::degenerate(format!("least-squares solve failed: {e}")))
}
