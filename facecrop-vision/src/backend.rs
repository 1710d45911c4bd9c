//! Transform estimation and resampling collaborators.
//!
//! The alignment pipeline only talks to [`AlignBackend`]. Two engines are
//! provided: [`NativeBackend`] resamples with the crate's own `ndarray`
//! sampler and supports every interpolation order and border mode;
//! [`ImageprocBackend`] hands resampling to `imageproc` and only accepts
//! what that crate can express. Both fit transforms with the same
//! `nalgebra` least-squares estimator.

use std::fmt;
use std::str::FromStr;

use image::{ImageBuffer, Luma};
use imageproc::geometric_transformations::{self as gt, Projection};
use ndarray::{Array3, ArrayView3, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{AlignError, Result};
use crate::landmarks::Landmarks;
use crate::params::{AlignType, BorderMode, Interpolation};
use crate::resample;
use crate::transform::{self, Estimate, EstimateOptions, Transform};

pub trait AlignBackend {
    fn name(&self) -> &'static str;

    /// Reject option combinations the engine cannot honor. Called before
    /// any image work.
    fn check_support(&self, _order: Interpolation, _border: BorderMode) -> Result<()> {
        Ok(())
    }

    /// Fit a transform taking `target` (canvas) points onto `source` points.
    fn estimate_transform(
        &self,
        target: &Landmarks,
        source: &Landmarks,
        kind: AlignType,
    ) -> Result<Estimate>;

    /// Resample `image` onto a `(height, width)` grid, reading each output
    /// pixel `p` from `transform · p`.
    fn warp(
        &self,
        image: ArrayView3<f32>,
        transform: &Transform,
        shape: (usize, usize),
        order: Interpolation,
        border: BorderMode,
    ) -> Result<Array3<f32>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NativeBackend {
    pub options: EstimateOptions,
}

impl AlignBackend for NativeBackend {
    fn name(&self) -> &'static str {
        "native"
    }

    fn estimate_transform(
        &self,
        target: &Landmarks,
        source: &Landmarks,
        kind: AlignType,
    ) -> Result<Estimate> {
        transform::estimate_transform(target, source, kind, &self.options)
    }

    fn warp(
        &self,
        image: ArrayView3<f32>,
        transform: &Transform,
        shape: (usize, usize),
        order: Interpolation,
        border: BorderMode,
    ) -> Result<Array3<f32>> {
        Ok(resample::warp(image, transform, shape, order, border))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ImageprocBackend {
    pub options: EstimateOptions,
}

impl ImageprocBackend {
    fn interpolation(order: Interpolation) -> Result<gt::Interpolation> {
        match order {
            Interpolation::Nearest => Ok(gt::Interpolation::Nearest),
            Interpolation::Linear | Interpolation::Area => Ok(gt::Interpolation::Bilinear),
            Interpolation::Cubic => Ok(gt::Interpolation::Bicubic),
            Interpolation::Lanczos4 => Err(AlignError::invalid(
                "imageproc backend has no lanczos kernel (orders 4 and 5)",
            )),
        }
    }
}

impl AlignBackend for ImageprocBackend {
    fn name(&self) -> &'static str {
        "imageproc"
    }

    fn check_support(&self, order: Interpolation, border: BorderMode) -> Result<()> {
        Self::interpolation(order)?;
        if border != BorderMode::Constant {
            return Err(AlignError::invalid(format!(
                "imageproc backend only supports the constant border mode, got '{border}'"
            )));
        }
        Ok(())
    }

    fn estimate_transform(
        &self,
        target: &Landmarks,
        source: &Landmarks,
        kind: AlignType,
    ) -> Result<Estimate> {
        transform::estimate_transform(target, source, kind, &self.options)
    }

    fn warp(
        &self,
        image: ArrayView3<f32>,
        transform: &Transform,
        shape: (usize, usize),
        order: Interpolation,
        border: BorderMode,
    ) -> Result<Array3<f32>> {
        self.check_support(order, border)?;
        let interpolation = Self::interpolation(order)?;

        // imageproc projections map source to output; ours maps output to source.
        let forward = transform
            .inverse()
            .ok_or_else(|| AlignError::Resample("transform is not invertible".into()))?;
        let m = forward.matrix();
        let mut row_major = [0f32; 9];
        for (i, v) in row_major.iter_mut().enumerate() {
            *v = m[(i / 3, i % 3)] as f32;
        }
        let projection = Projection::from_matrix(row_major)
            .ok_or_else(|| AlignError::Resample("projection matrix is singular".into()))?;

        let (src_h, src_w, channels) = image.dim();
        let (out_h, out_w) = shape;
        let mut out = Array3::zeros((out_h, out_w, channels));
        for (ch, mut dst) in out.axis_iter_mut(Axis(2)).enumerate() {
            let plane: Vec<f32> = image.index_axis(Axis(2), ch).iter().copied().collect();
            let src: ImageBuffer<Luma<f32>, Vec<f32>> =
                ImageBuffer::from_raw(src_w as u32, src_h as u32, plane).ok_or_else(|| {
                    AlignError::Resample(format!("cannot wrap {src_w}x{src_h} channel {ch}"))
                })?;
            let mut warped = ImageBuffer::new(out_w as u32, out_h as u32);
            gt::warp_into(&src, &projection, interpolation, Luma([0.0f32]), &mut warped);
            for (d, s) in dst.iter_mut().zip(warped.as_raw().iter()) {
                *d = *s;
            }
        }
        Ok(out)
    }
}

/// Run-time selectable backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Native,
    Imageproc,
}

impl FromStr for BackendKind {
    type Err = AlignError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "native" => Ok(Self::Native),
            "imageproc" => Ok(Self::Imageproc),
            other => Err(AlignError::invalid(format!(
                "backend must be 'native' or 'imageproc', got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Native => "native",
            Self::Imageproc => "imageproc",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backend {
    Native(NativeBackend),
    Imageproc(ImageprocBackend),
}

impl Backend {
    pub fn new(kind: BackendKind, options: EstimateOptions) -> Self {
        match kind {
            BackendKind::Native => Self::Native(NativeBackend { options }),
            BackendKind::Imageproc => Self::Imageproc(ImageprocBackend { options }),
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Native(_) => BackendKind::Native,
            Self::Imageproc(_) => BackendKind::Imageproc,
        }
    }

    fn inner(&self) -> &dyn AlignBackend {
        match self {
            Self::Native(b) => b,
            Self::Imageproc(b) => b,
        }
    }
}

impl Default for Backend {
    fn default() -> Self {
        Self::Native(NativeBackend::default())
    }
}

impl AlignBackend for Backend {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn check_support(&self, order: Interpolation, border: BorderMode) -> Result<()> {
        self.inner().check_support(order, border)
    }

    fn estimate_transform(
        &self,
        target: &Landmarks,
        source: &Landmarks,
        kind: AlignType,
    ) -> Result<Estimate> {
        self.inner().estimate_transform(target, source, kind)
    }

    fn warp(
        &self,
        image: ArrayView3<f32>,
        transform: &Transform,
        shape: (usize, usize),
        order: Interpolation,
        border: BorderMode,
    ) -> Result<Array3<f32>> {
        self.inner().warp(image, transform, shape, order, border)
    }
}
