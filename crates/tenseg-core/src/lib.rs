//! # tenseg-core
//!
//! Dense tensor type and the spatial substrate used by TenSeg's
//! differentiable resize operator and decode heads.
//!
//! - **Dense tensor representation** ([`DenseND`]) backed by `scirs2-core` ndarrays
//! - **Interpolation** ([`DenseND::interpolate`]) with nearest, bilinear, bicubic and area kernels
//! - **Adaptive average pooling** ([`DenseND::adaptive_avg_pool2d`]) to an arbitrary grid
//! - **Convolution** ([`DenseND::conv2d_nchw`]) via im2col + GEMM
//! - **Channel concatenation** ([`DenseND::concatenate`])
//!
//! ## Layout
//!
//! Feature maps are `(batch, channel, height, width)`. Spatial operations
//! touch dims 2 and 3 only.
//!
//! ## SciRS2 Integration
//!
//! Array storage, numeric traits and random sampling all come from
//! `scirs2-core`; `ndarray`, `num-traits` and `rand` are not used directly.
//!
//! ## Quick Start
//!
//! ```
//! use tenseg_core::{DenseND, InterpolationMode};
//!
//! let features = DenseND::<f32>::ones(&[1, 8, 16, 16]);
//!
//! // Global context: pool to a single cell, then bring it back
//! let pooled = features.adaptive_avg_pool2d((1, 1)).unwrap();
//! let restored = pooled
//!     .interpolate(Some((16, 16)), None, InterpolationMode::Bilinear, false)
//!     .unwrap();
//! assert_eq!(restored.shape(), features.shape());
//! ```
//!
//! ## Error Handling
//!
//! Operations return `anyhow::Result` and fail fast on malformed shapes:
//!
//! ```
//! use tenseg_core::{DenseND, InterpolationMode};
//!
//! let matrix = DenseND::<f64>::zeros(&[4, 4]);
//! assert!(matrix
//!     .interpolate(Some((8, 8)), None, InterpolationMode::Nearest, false)
//!     .is_err());
//! ```
//!
//! ## Features
//!
//! - `serde`: Serialization support for [`InterpolationMode`] and [`ConvPadding`]

#![deny(warnings)]

pub mod dense;
pub mod interpolation;

pub use dense::{ConvPadding, DenseND};
pub use interpolation::InterpolationMode;
