//! Error types for the differentiable resize operator
//!
//! Every failure here is fail-fast: nothing is retried and nothing is
//! silently coerced beyond the integer truncation of a requested size.
//!
//! # Examples
//!
//! ```
//! use tenseg_ad::error::ResizeError;
//!
//! let err = ResizeError::ShapeMismatch {
//!     expected: vec![1, 3, 8, 8],
//!     actual: vec![1, 3, 4, 4],
//! };
//! assert!(err.to_string().contains("[1, 3, 8, 8]"));
//! ```

use tenseg_core::InterpolationMode;
use thiserror::Error;

/// Errors raised by resize forward and gradient calls
#[derive(Error, Debug)]
pub enum ResizeError {
    /// Neither or both of `size` and `scale_factor` were supplied
    #[error("Invalid scale descriptor: exactly one of size or scale_factor must be given (size: {size}, scale_factor: {scale_factor})")]
    InvalidDescriptor {
        /// Whether a size was supplied
        size: bool,
        /// Whether a scale factor was supplied
        scale_factor: bool,
    },

    /// `align_corners` was set for a mode that has no corner convention
    #[error("align_corners option can only be set with the interpolating modes: bilinear | bicubic (got {mode})")]
    UnsupportedAlignment {
        /// The offending mode
        mode: InterpolationMode,
    },

    /// A mode name that is not registered
    #[error("Unregistered interpolation mode '{0}'")]
    UnknownMode(String),

    /// A size or scale factor that does not describe a non-empty output
    #[error("Invalid resize target: {0}")]
    InvalidSize(String),

    /// The gradient does not have the shape the forward pass produced
    #[error("Gradient shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Shape recorded by the forward pass
        expected: Vec<usize>,
        /// Shape of the supplied gradient
        actual: Vec<usize>,
    },

    /// `backward` was called without a preceding `forward`
    #[error("No resize context recorded: backward must follow forward")]
    MissingContext,

    /// `forward` was called again before the previous context was consumed
    #[error("A resize context is still pending: call backward before the next forward")]
    PendingContext,

    /// The input is not an NCHW feature map
    #[error("Resize expects a rank-4 (N, C, H, W) tensor, got rank {rank}")]
    NotFeatureMap {
        /// Rank of the supplied tensor
        rank: usize,
    },

    /// Failure inside the tensor substrate
    #[error("Tensor backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Result alias for resize operations
pub type ResizeResult<T> = std::result::Result<T, ResizeError>;
