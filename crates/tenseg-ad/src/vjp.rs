//! Vector-Jacobian Product (VJP) rules
//!
//! For a forward operation `y = f(x1, x2, ...)`, the VJP computes:
//! ```text
//! vjp(dy) = (∂L/∂x1, ∂L/∂x2, ...)
//! ```
//! where `dy = ∂L/∂y` is the incoming gradient (cotangent).
//!
//! A VJP context is built during the forward pass and holds exactly what the
//! backward rule needs, nothing more. Resize records only shapes and
//! interpolation parameters; the input values are never saved because the
//! gradient does not depend on them.

use anyhow::Result;
use scirs2_core::numeric::{Float, FromPrimitive};
use tenseg_core::DenseND;

/// Trait for operations that support VJP (backward differentiation)
pub trait VjpOp<T>
where
    T: Float + FromPrimitive,
{
    /// Compute the VJP (backward pass) given the output gradient
    ///
    /// # Arguments
    ///
    /// * `output_grad` - Gradient w.r.t. the output (∂L/∂output)
    ///
    /// # Returns
    ///
    /// Gradients w.r.t. each input: (∂L/∂input1, ∂L/∂input2, ...)
    fn vjp(&self, output_grad: &DenseND<T>) -> Result<Vec<DenseND<T>>>;

    /// Short operation name used in tape diagnostics
    fn name(&self) -> &str {
        "op"
    }
}
