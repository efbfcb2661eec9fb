//! # tenseg-nn
//!
//! Decode-head building blocks for TenSeg.
//!
//! - [`ppm::PyramidPoolingModule`]: multi-scale context aggregation
//! - [`psp_head::PspHead`]: pyramid pooling fused with the input, bottleneck and classifier
//! - [`conv_module::ConvModule`]: conv → batch norm → ReLU
//! - [`init`]: weight initialisation helpers
//!
//! Every module runs in inference mode: batch norm uses running statistics
//! and dropout is the identity.

#![deny(warnings)]

pub mod conv_module;
pub mod init;
pub mod ppm;
pub mod psp_head;

pub use conv_module::{BatchNorm2d, Conv2d, ConvModule, ConvModuleConfig};
pub use ppm::{PoolingBranch, PyramidPoolingModule};
pub use psp_head::{PspHead, PspHeadConfig};
