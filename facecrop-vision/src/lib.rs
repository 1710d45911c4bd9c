//! Five-point face alignment and cropping.
//!
//! Given the eyes, nose and mouth corners detected in an image, the pipeline
//! fits a similarity or affine transform from a canonical mean shape to the
//! detected points, resamples the (possibly padded) image through it, and
//! returns a square crop of `crop_size` pixels.

pub mod align;
pub mod backend;
pub mod canvas;
pub mod convert;
pub mod error;
pub mod landmarks;
pub mod params;
pub mod resample;
pub mod transform;

// Re-export commonly used types
pub use align::{align_and_crop, align_and_crop_with, crop_with_plan, AlignPlan, Aligner};
pub use backend::{AlignBackend, Backend, BackendKind, ImageprocBackend, NativeBackend};
pub use error::{AlignError, Result};
pub use landmarks::{Landmarks, DEFAULT_MEAN_LANDMARKS};
pub use params::{AlignParams, AlignType, BorderMode, Correspondence, Interpolation};
pub use transform::{Estimate, EstimateOptions, Transform};
