//! Dense tensor implementation and operations
//!
//! `DenseND` plus its operations, grouped by concern.

// Core type definition
pub mod types;

// Operation modules (organized by functionality)
mod combining;
pub mod convolution;
mod creation;
mod elementwise;
mod spatial;

// Supporting modules
pub mod densend_traits;

pub use convolution::ConvPadding;
pub use types::DenseND;
