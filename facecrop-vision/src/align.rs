use log::debug;
use ndarray::{Array3, ArrayView3};
use serde::Serialize;

use crate::backend::{AlignBackend, Backend, NativeBackend};
use crate::canvas::{self, CanvasLayout};
use crate::error::{AlignError, Result};
use crate::landmarks::Landmarks;
use crate::params::AlignParams;
use crate::transform::Estimate;

/// Geometry of one alignment, computable without touching pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AlignPlan {
    pub layout: CanvasLayout,
    /// Canonical landmarks projected onto the canvas.
    pub target: Landmarks,
    /// Source landmarks in padded-image coordinates.
    pub source: Landmarks,
    pub estimate: Estimate,
}

/// Canonical mean shape, recentered on the eyes and placed on the canvas.
pub fn target_landmarks(params: &AlignParams, layout: &CanvasLayout) -> Landmarks {
    params
        .mean_landmarks
        .normalized()
        .projected(params.landmark_scale(), layout.offset_f64())
}

/// Compute the alignment geometry for a `height × width` source.
pub fn plan_with<B: AlignBackend + ?Sized>(
    backend: &B,
    height: usize,
    width: usize,
    source: &Landmarks,
    params: &AlignParams,
) -> Result<AlignPlan> {
    params.validate()?;
    source.validate()?;
    if height == 0 || width == 0 {
        return Err(AlignError::invalid(format!(
            "image must be non-empty, got {height}x{width}"
        )));
    }

    let layout = CanvasLayout::compute(height, width, params.crop_size);
    let target = target_landmarks(params, &layout);
    let shifted = layout.shift_landmarks(source);
    debug!(
        "{}x{} source, crop {}: padding {:?}, offset {:?}, canvas {:?}",
        height, width, params.crop_size, layout.padding, layout.offset, layout.canvas_size
    );

    let estimate = backend.estimate_transform(
        &params.correspondence.apply(&target),
        &params.correspondence.apply(&shifted),
        params.align_type,
    )?;
    Ok(AlignPlan {
        layout,
        target,
        source: shifted,
        estimate,
    })
}

/// Align and crop with an explicit backend.
pub fn align_and_crop_with<B: AlignBackend + ?Sized>(
    backend: &B,
    image: ArrayView3<f32>,
    source: &Landmarks,
    params: &AlignParams,
) -> Result<Array3<f32>> {
    let (height, width, channels) = image.dim();
    if channels == 0 {
        return Err(AlignError::invalid("image has no channels"));
    }
    backend.check_support(params.order, params.border)?;
    let plan = plan_with(backend, height, width, source, params)?;
    crop_with_plan(backend, image, &plan, params)
}

/// Pad, warp and crop `image` through a plan computed for it earlier.
pub fn crop_with_plan<B: AlignBackend + ?Sized>(
    backend: &B,
    image: ArrayView3<f32>,
    plan: &AlignPlan,
    params: &AlignParams,
) -> Result<Array3<f32>> {
    let (height, width, channels) = image.dim();
    if channels == 0 {
        return Err(AlignError::invalid("image has no channels"));
    }
    let layout = &plan.layout;
    let planned = (
        layout.padded_size.0 - layout.padding.top - layout.padding.bottom,
        layout.padded_size.1 - layout.padding.left - layout.padding.right,
    );
    if planned != (height, width) || layout.crop_size != params.crop_size {
        return Err(AlignError::invalid(format!(
            "plan for a {}x{} source with crop {} does not fit a {height}x{width} image with crop {}",
            planned.0, planned.1, layout.crop_size, params.crop_size
        )));
    }
    backend.check_support(params.order, params.border)?;

    let padded = canvas::pad_image(image, &layout.padding, params.border);
    let warped = backend.warp(
        padded.view(),
        &plan.estimate.transform,
        layout.canvas_size,
        params.order,
        params.border,
    )?;
    let expected = (layout.canvas_size.0, layout.canvas_size.1, channels);
    if warped.dim() != expected {
        return Err(AlignError::Resample(format!(
            "{} backend returned shape {:?}, expected {:?}",
            backend.name(),
            warped.dim(),
            expected
        )));
    }
    canvas::crop_bottom_right(warped.view(), params.crop_size)
}

/// Align and crop with the native backend.
pub fn align_and_crop(
    image: ArrayView3<f32>,
    source: &Landmarks,
    params: &AlignParams,
) -> Result<Array3<f32>> {
    align_and_crop_with(&NativeBackend::default(), image, source, params)
}

/// Backend and parameters bundled for repeated use.
#[derive(Debug, Clone, PartialEq)]
pub struct Aligner<B = Backend> {
    pub backend: B,
    pub params: AlignParams,
}

impl<B: AlignBackend> Aligner<B> {
    pub fn new(backend: B, params: AlignParams) -> Result<Self> {
        params.validate()?;
        backend.check_support(params.order, params.border)?;
        Ok(Self { backend, params })
    }

    pub fn plan(&self, height: usize, width: usize, source: &Landmarks) -> Result<AlignPlan> {
        plan_with(&self.backend, height, width, source, &self.params)
    }

    pub fn align(&self, image: ArrayView3<f32>, source: &Landmarks) -> Result<Array3<f32>> {
        align_and_crop_with(&self.backend, image, source, &self.params)
    }

    /// Crop with a plan from [`Aligner::plan`] instead of fitting again.
    pub fn align_planned(&self, image: ArrayView3<f32>, plan: &AlignPlan) -> Result<Array3<f32>> {
        crop_with_plan(&self.backend, image, plan, &self.params)
    }
}
