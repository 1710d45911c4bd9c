//! Canvas geometry: padding of undersized sources, the resampling canvas
//! shape, and the final bottom-right crop.

use ndarray::{s, Array3, ArrayView3, CowArray, Ix3};
use serde::Serialize;

use crate::error::{AlignError, Result};
use crate::landmarks::Landmarks;
use crate::params::BorderMode;

/// Pixels added on each side of the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Padding {
    pub top: usize,
    pub bottom: usize,
    pub left: usize,
    pub right: usize,
}

impl Padding {
    pub fn is_empty(&self) -> bool {
        self.top == 0 && self.bottom == 0 && self.left == 0 && self.right == 0
    }
}

/// Half of the shortfall of `dim` against `crop_size`, rounded up.
/// Zero when the dimension already covers the crop.
pub fn half_deficit(dim: usize, crop_size: usize) -> usize {
    if dim < crop_size {
        (crop_size - dim + 1) / 2
    } else {
        0
    }
}

/// Where the source lands on the resampling canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CanvasLayout {
    pub padding: Padding,
    /// Canvas center offset `[x, y]`: half the unpadded size plus padding.
    pub offset: [usize; 2],
    /// `(height, width)` of the padded source.
    pub padded_size: (usize, usize),
    /// `(height, width)` of the resampling canvas.
    pub canvas_size: (usize, usize),
    pub crop_size: usize,
}

impl CanvasLayout {
    pub fn compute(height: usize, width: usize, crop_size: usize) -> Self {
        let v_half = half_deficit(height, crop_size);
        let w_half = half_deficit(width, crop_size);
        let padding = Padding {
            top: v_half,
            bottom: v_half,
            left: w_half,
            right: w_half,
        };
        let offset = [width / 2 + w_half, height / 2 + v_half];
        let canvas_size = (
            crop_size / 2 + offset[1] + 1,
            crop_size / 2 + offset[0] + 1,
        );
        Self {
            padding,
            offset,
            padded_size: (height + 2 * v_half, width + 2 * w_half),
            canvas_size,
            crop_size,
        }
    }

    pub fn offset_f64(&self) -> [f64; 2] {
        [self.offset[0] as f64, self.offset[1] as f64]
    }

    /// Move source landmarks into padded-image coordinates.
    pub fn shift_landmarks(&self, landmarks: &Landmarks) -> Landmarks {
        landmarks.translated(self.padding.left as f64, self.padding.top as f64)
    }

    /// Top-left `(row, col)` of the crop within the canvas.
    pub fn crop_origin(&self) -> (usize, usize) {
        (
            self.canvas_size.0 - self.crop_size,
            self.canvas_size.1 - self.crop_size,
        )
    }
}

/// Pad `image` by `padding`, filling per `border`. Returns the input view
/// untouched when there is nothing to pad.
pub fn pad_image<'a>(
    image: ArrayView3<'a, f32>,
    padding: &Padding,
    border: BorderMode,
) -> CowArray<'a, f32, Ix3> {
    if padding.is_empty() {
        return CowArray::from(image);
    }
    let (h, w, c) = image.dim();
    let shape = (
        h + padding.top + padding.bottom,
        w + padding.left + padding.right,
        c,
    );
    let (top, left) = (padding.top as isize, padding.left as isize);
    let padded = Array3::from_shape_fn(shape, |(y, x, ch)| {
        match (
            border.fold(y as isize - top, h),
            border.fold(x as isize - left, w),
        ) {
            (Some(sy), Some(sx)) => image[[sy, sx, ch]],
            _ => 0.0,
        }
    });
    CowArray::from(padded)
}

/// Last `crop_size` rows and columns of the canvas.
pub fn crop_bottom_right(canvas: ArrayView3<f32>, crop_size: usize) -> Result<Array3<f32>> {
    let (h, w, _) = canvas.dim();
    if h < crop_size || w < crop_size {
        return Err(AlignError::Resample(format!(
            "canvas {h}x{w} is smaller than crop size {crop_size}"
        )));
    }
    Ok(canvas.slice(s![h - crop_size.., w - crop_size.., ..]).to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    fn ramp(h: usize, w: usize) -> Array3<f32> {
        Array::from_shape_fn((h, w, 1), |(y, x, _)| (y * w + x) as f32)
    }

    #[test]
    fn half_deficit_rounds_up() {
        assert_eq!(half_deficit(256, 512), 128);
        assert_eq!(half_deficit(255, 512), 129);
        assert_eq!(half_deficit(511, 512), 1);
        assert_eq!(half_deficit(512, 512), 0);
        assert_eq!(half_deficit(900, 512), 0);
    }

    #[test]
    fn no_padding_for_large_images() {
        let layout = CanvasLayout::compute(600, 700, 512);
        assert!(layout.padding.is_empty());
        assert_eq!(layout.offset, [350, 300]);
        assert_eq!(layout.padded_size, (600, 700));
        assert_eq!(layout.canvas_size, (256 + 300 + 1, 256 + 350 + 1));
        let lm = Landmarks::new([[1.0, 2.0]; 5]);
        assert_eq!(layout.shift_landmarks(&lm), lm);
    }

    #[test]
    fn pads_each_short_axis_symmetrically() {
        let layout = CanvasLayout::compute(101, 600, 512);
        assert_eq!(layout.padding.top, 206);
        assert_eq!(layout.padding.bottom, 206);
        assert_eq!(layout.padding.left, 0);
        assert_eq!(layout.offset, [300, 50 + 206]);
        assert_eq!(layout.padded_size, (513, 600));
    }

    #[test]
    fn canvas_always_covers_crop() {
        for crop in [1usize, 2, 7, 64, 513] {
            for dim in [1usize, 2, 3, 63, 64, 65, 600] {
                let layout = CanvasLayout::compute(dim, dim + 1, crop);
                assert!(layout.canvas_size.0 >= crop, "crop {crop} dim {dim}");
                assert!(layout.canvas_size.1 >= crop, "crop {crop} dim {dim}");
            }
        }
    }

    #[test]
    fn pad_image_edge_and_constant() {
        let img = ramp(2, 3);
        let padding = Padding { top: 1, bottom: 1, left: 2, right: 2 };

        let edge = pad_image(img.view(), &padding, BorderMode::Edge);
        assert_eq!(edge.dim(), (4, 7, 1));
        assert_eq!(edge[[0, 0, 0]], 0.0);
        assert_eq!(edge[[3, 6, 0]], 5.0);
        assert_eq!(edge[[1, 2, 0]], 0.0);
        assert_eq!(edge[[2, 4, 0]], 5.0);

        let constant = pad_image(img.view(), &padding, BorderMode::Constant);
        assert_eq!(constant[[0, 3, 0]], 0.0);
        assert_eq!(constant[[1, 3, 0]], 1.0);
        assert_eq!(constant[[1, 1, 0]], 0.0);
    }

    #[test]
    fn pad_image_reflect_wider_than_source() {
        let img = ramp(1, 3);
        let padding = Padding { top: 0, bottom: 0, left: 5, right: 0 };
        let reflected = pad_image(img.view(), &padding, BorderMode::Reflect);
        let row: Vec<f32> = reflected.slice(s![0, .., 0]).to_vec();
        assert_eq!(row, vec![1.0, 0.0, 1.0, 2.0, 1.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn pad_image_borrows_when_unpadded() {
        let img = ramp(4, 4);
        let out = pad_image(img.view(), &Padding::default(), BorderMode::Edge);
        assert!(out.is_view());
    }

    #[test]
    fn crop_takes_bottom_right_corner() {
        let canvas = ramp(5, 6);
        let crop = crop_bottom_right(canvas.view(), 3).unwrap();
        assert_eq!(crop.dim(), (3, 3, 1));
        assert_eq!(crop[[0, 0, 0]], (2 * 6 + 3) as f32);
        assert_eq!(crop[[2, 2, 0]], 29.0);
        assert!(crop_bottom_right(canvas.view(), 6).is_err());
    }
}
