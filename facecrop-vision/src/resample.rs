//! Backward-mapping resampler over `ndarray` images.
//!
//! Every output pixel `p` is read from the source at `transform · p`, so the
//! transform passed in maps output coordinates to source coordinates.

use std::f64::consts::PI;

use ndarray::{Array3, ArrayView3};

use crate::params::{BorderMode, Interpolation};
use crate::transform::Transform;

const MAX_TAPS: usize = 8;
/// Sample coordinates are clamped to this magnitude before index math.
/// Anything this far out is resolved by the border mode alone.
const COORD_LIMIT: f64 = 1e15;
/// Free parameter of the bicubic convolution kernel.
const CUBIC_A: f64 = -0.75;

/// Source indices and weights along one axis.
#[derive(Debug, Clone, Copy)]
struct Taps {
    start: isize,
    len: usize,
    weights: [f64; MAX_TAPS],
}

impl Taps {
    fn new(order: Interpolation, coord: f64) -> Self {
        let coord = coord.clamp(-COORD_LIMIT, COORD_LIMIT);
        let mut weights = [0.0; MAX_TAPS];
        match order {
            Interpolation::Nearest => {
                weights[0] = 1.0;
                Self {
                    start: coord.round() as isize,
                    len: 1,
                    weights,
                }
            }
            Interpolation::Linear | Interpolation::Area => {
                let base = coord.floor();
                let t = coord - base;
                weights[0] = 1.0 - t;
                weights[1] = t;
                Self {
                    start: base as isize,
                    len: 2,
                    weights,
                }
            }
            Interpolation::Cubic => {
                let base = coord.floor();
                weights[..4].copy_from_slice(&cubic_weights(coord - base));
                Self {
                    start: (base as isize).saturating_sub(1),
                    len: 4,
                    weights,
                }
            }
            Interpolation::Lanczos4 => {
                let base = coord.floor();
                weights.copy_from_slice(&lanczos4_weights(coord - base));
                Self {
                    start: (base as isize).saturating_sub(3),
                    len: 8,
                    weights,
                }
            }
        }
    }

    fn indices(&self, len: usize, border: BorderMode) -> [Option<usize>; MAX_TAPS] {
        let mut out = [None; MAX_TAPS];
        for (i, slot) in out.iter_mut().take(self.len).enumerate() {
            *slot = border.fold(self.start.saturating_add(i as isize), len);
        }
        out
    }
}

fn cubic_weights(t: f64) -> [f64; 4] {
    let a = CUBIC_A;
    let w0 = ((a * (t + 1.0) - 5.0 * a) * (t + 1.0) + 8.0 * a) * (t + 1.0) - 4.0 * a;
    let w1 = ((a + 2.0) * t - (a + 3.0)) * t * t + 1.0;
    let u = 1.0 - t;
    let w2 = ((a + 2.0) * u - (a + 3.0)) * u * u + 1.0;
    [w0, w1, w2, 1.0 - w0 - w1 - w2]
}

fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-12 {
        1.0
    } else {
        let px = PI * x;
        px.sin() / px
    }
}

/// Normalized Lanczos window (a = 4) for taps at offsets -3..=4.
fn lanczos4_weights(t: f64) -> [f64; 8] {
    let mut weights = [0.0; 8];
    for (i, w) in weights.iter_mut().enumerate() {
        let d = t + 3.0 - i as f64;
        *w = sinc(d) * sinc(d / 4.0);
    }
    let sum: f64 = weights.iter().sum();
    weights.iter_mut().for_each(|w| *w /= sum);
    weights
}

/// Warp `image` onto an `(height, width)` grid.
pub fn warp(
    image: ArrayView3<f32>,
    transform: &Transform,
    shape: (usize, usize),
    order: Interpolation,
    border: BorderMode,
) -> Array3<f32> {
    let (src_h, src_w, channels) = image.dim();
    let (out_h, out_w) = shape;
    let mut out = Array3::zeros((out_h, out_w, channels));
    let mut acc = vec![0.0f64; channels];

    for (y, mut row) in out.outer_iter_mut().enumerate() {
        for (x, mut pixel) in row.outer_iter_mut().enumerate() {
            let [sx, sy] = transform.apply([x as f64, y as f64]);
            let tx = Taps::new(order, sx);
            let ty = Taps::new(order, sy);
            let xi = tx.indices(src_w, border);
            let yi = ty.indices(src_h, border);

            acc.iter_mut().for_each(|v| *v = 0.0);
            for ky in 0..ty.len {
                let Some(row_idx) = yi[ky] else { continue };
                let wy = ty.weights[ky];
                for kx in 0..tx.len {
                    let Some(col_idx) = xi[kx] else { continue };
                    let w = wy * tx.weights[kx];
                    let src = image.slice(ndarray::s![row_idx, col_idx, ..]);
                    for (a, &v) in acc.iter_mut().zip(src.iter()) {
                        *a += w * v as f64;
                    }
                }
            }
            for (dst, &v) in pixel.iter_mut().zip(acc.iter()) {
                *dst = v as f32;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array;

    fn checker(h: usize, w: usize) -> Array3<f32> {
        Array::from_shape_fn((h, w, 2), |(y, x, c)| {
            ((y * 7 + x * 3) % 11) as f32 + c as f32 * 100.0
        })
    }

    const ALL_ORDERS: [Interpolation; 5] = [
        Interpolation::Nearest,
        Interpolation::Linear,
        Interpolation::Area,
        Interpolation::Cubic,
        Interpolation::Lanczos4,
    ];

    #[test]
    fn kernels_are_partitions_of_unity() {
        for t in [0.0, 0.1, 0.25, 0.5, 0.73, 0.999] {
            let c: f64 = cubic_weights(t).iter().sum();
            let l: f64 = lanczos4_weights(t).iter().sum();
            assert_abs_diff_eq!(c, 1.0, epsilon = 1e-12);
            assert_abs_diff_eq!(l, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn kernels_interpolate_at_integer_positions() {
        let c = cubic_weights(0.0);
        assert_abs_diff_eq!(c[1], 1.0, epsilon = 1e-12);
        let l = lanczos4_weights(0.0);
        assert_abs_diff_eq!(l[3], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn identity_warp_reproduces_image() {
        let img = checker(9, 12);
        for order in ALL_ORDERS {
            let out = warp(img.view(), &Transform::identity(), (9, 12), order, BorderMode::Edge);
            for (a, b) in out.iter().zip(img.iter()) {
                assert_abs_diff_eq!(*a, *b, epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn integer_shift_with_nearest() {
        let img = checker(6, 6);
        let shift = Transform::from_rows([[1.0, 0.0, 2.0], [0.0, 1.0, -1.0]]);
        let out = warp(img.view(), &shift, (6, 6), Interpolation::Nearest, BorderMode::Constant);
        assert_eq!(out[[3, 1, 0]], img[[2, 3, 0]]);
        assert_eq!(out[[3, 1, 1]], img[[2, 3, 1]]);
        // row 0 samples source row -1, x = 4 and 5 sample beyond the right edge
        assert_eq!(out[[0, 2, 0]], 0.0);
        assert_eq!(out[[2, 4, 1]], 0.0);
    }

    #[test]
    fn edge_border_extends_last_pixel() {
        let img = checker(4, 4);
        let far = Transform::from_rows([[1.0, 0.0, 50.0], [0.0, 1.0, 50.0]]);
        let out = warp(img.view(), &far, (2, 2), Interpolation::Linear, BorderMode::Edge);
        assert_eq!(out[[0, 0, 0]], img[[3, 3, 0]]);
        assert_eq!(out[[1, 1, 1]], img[[3, 3, 1]]);
    }

    #[test]
    fn linear_midpoint_averages_neighbours() {
        let img = Array::from_shape_vec((1, 2, 1), vec![10.0f32, 20.0]).unwrap();
        let half = Transform::from_rows([[1.0, 0.0, 0.5], [0.0, 1.0, 0.0]]);
        let out = warp(img.view(), &half, (1, 1), Interpolation::Linear, BorderMode::Edge);
        assert_abs_diff_eq!(out[[0, 0, 0]], 15.0, epsilon = 1e-6);
    }

    #[test]
    fn far_out_coordinates_fall_back_to_border() {
        let img = checker(4, 5);
        let far = Transform::from_rows([[1e28, 0.0, 1e30], [0.0, 1e28, -1e30]]);
        for order in ALL_ORDERS {
            let edge = warp(img.view(), &far, (3, 3), order, BorderMode::Edge);
            for v in edge.slice(ndarray::s![.., .., 0]).iter() {
                assert_abs_diff_eq!(*v, img[[0, 4, 0]], epsilon = 1e-3);
            }
            let constant = warp(img.view(), &far, (3, 3), order, BorderMode::Constant);
            assert!(constant.iter().all(|&v| v == 0.0), "{order}");
            for border in [BorderMode::Symmetric, BorderMode::Reflect, BorderMode::Wrap] {
                let out = warp(img.view(), &far, (3, 3), order, border);
                assert!(out.iter().all(|v| v.is_finite()), "{order} {border}");
            }
        }
    }

    #[test]
    fn output_shape_follows_request() {
        let img = checker(5, 5);
        let out = warp(img.view(), &Transform::identity(), (3, 8), Interpolation::Cubic, BorderMode::Wrap);
        assert_eq!(out.dim(), (3, 8, 2));
    }
}
