//! # TenSeg - Segmentation building blocks for COOLJAPAN
//!
//! Differentiable resizing and pyramid pooling on NCHW feature maps.
//!
//! This is the **meta crate** that re-exports all TenSeg components for convenient access.
//!
//! ## Quick Start
//!
//! ```
//! use tenseg::prelude::*;
//!
//! let features = DenseND::<f32>::random_uniform(&[1, 64, 32, 32], 0.0, 1.0);
//!
//! let ppm = PyramidPoolingModule::new(&[1, 2, 3, 6], 64, 16, false)?;
//! let context = ppm.forward(&features)?;
//! assert_eq!(context.len(), 4);
//! assert!(context.iter().all(|c| c.shape() == &[1, 16, 32, 32]));
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Components
//!
//! ### Spatial Substrate ([`core`])
//!
//! Dense tensors, interpolation kernels, adaptive average pooling and 2-D convolution.
//!
//! ```
//! use tenseg::core::{DenseND, InterpolationMode};
//!
//! let x = DenseND::<f64>::ones(&[1, 1, 4, 4]);
//! let y = x.interpolate(Some((8, 8)), None, InterpolationMode::Bilinear, false).unwrap();
//! assert_eq!(y.shape(), &[1, 1, 8, 8]);
//! ```
//!
//! ### Differentiable Resize ([`ad`])
//!
//! A resize operator that records its forward configuration and maps an output
//! gradient back to the input size.
//!
//! ```
//! use tenseg::ad::Resize;
//! use tenseg::core::{DenseND, InterpolationMode};
//!
//! let x = DenseND::<f64>::ones(&[1, 2, 5, 5]);
//! let mut op = Resize::new();
//! let y = op
//!     .forward(&x, Some((10.0, 10.0)), None, InterpolationMode::Bilinear, Some(false))
//!     .unwrap();
//! let grad = op.backward(&DenseND::<f64>::ones(y.shape())).unwrap();
//! assert_eq!(grad.shape(), &[1, 2, 5, 5]);
//! ```
//!
//! ### Decode Heads ([`nn`])
//!
//! Pyramid pooling module, PSP head, ConvModule and weight initialisation.
//!
//! ## Features
//!
//! - `serde`: Serialize configuration types

#![deny(warnings)]

pub use tenseg_ad as ad;
pub use tenseg_core as core;
pub use tenseg_nn as nn;

pub mod prelude {
    //! Prelude module for convenient imports
    //!
    //! # Example
    //!
    //! ```
    //! use tenseg::prelude::*;
    //!
    //! let tensor = DenseND::<f64>::zeros(&[1, 3, 8, 8]);
    //! ```

    // Core types
    pub use crate::core::{ConvPadding, DenseND, InterpolationMode};

    // Resize
    pub use crate::ad::{
        alignment_advisory, resize, resize_forward, resize_with_context, AlignmentAdvisory,
        Resize, ResizeContext, ResizeError, ResizeResult, ScaleFactor, Upsample,
    };

    // Autodiff plumbing
    pub use crate::ad::{GradientTape, OperationId, VjpOp};

    // Decode heads
    pub use crate::nn::{
        ConvModule, ConvModuleConfig, PspHead, PspHeadConfig, PyramidPoolingModule,
    };
}
