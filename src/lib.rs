pub mod config;
pub mod input;

// Re-export alignment types for convenience
pub use facecrop_vision::{
    align, backend, canvas, convert, AlignParams, AlignPlan, AlignType, Aligner, Backend,
    BackendKind, BorderMode, Interpolation, Landmarks,
};
