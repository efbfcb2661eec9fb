//! # tenseg-ad
//!
//! Differentiable resize for TenSeg.
//!
//! This crate provides:
//! - A spatial resize operator with a custom gradient rule (transposed resampling)
//! - The `resize` wrapper with the align-corners advisory, and `Upsample`
//! - A VJP trait and a gradient tape that consumes each context exactly once
//! - Finite-difference gradient checking

#![deny(warnings)]

pub mod error;
pub mod gradcheck;
pub mod resize;
pub mod tape;
pub mod vjp;

// Re-exports
pub use error::{ResizeError, ResizeResult};
pub use resize::{
    alignment_advisory, resize, resize_forward, resize_with_context, AlignmentAdvisory, Resize,
    ResizeContext, ScaleDescriptor, ScaleFactor, Upsample,
};
pub use tape::{interpolate_recorded, GradientTape, OperationId};
pub use vjp::VjpOp;
