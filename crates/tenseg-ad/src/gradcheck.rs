//! Gradient checking against finite differences
//!
//! Compares an analytic VJP with the numerical directional derivative
//! `<grad_y, (f(x + h e_i) - f(x - h e_i)) / 2h>` for every input element.
//!
//! Resize is linear in its input, so finite differences are exact up to
//! rounding. The resize gradient passes the check when input and output
//! sizes are equal and fails it otherwise, because transposed resampling is
//! not the true adjoint of interpolation.
//!
//! # Example
//!
//! ```
//! use tenseg_ad::gradcheck::{check_gradient, GradCheckConfig};
//! use tenseg_ad::resize::resize_forward;
//! use tenseg_core::{DenseND, InterpolationMode};
//!
//! let mode = InterpolationMode::Bilinear;
//! let f = |x: &DenseND<f64>| -> anyhow::Result<DenseND<f64>> {
//!     Ok(resize_forward(x, Some((4.0, 4.0)), None, mode, None)?.0)
//! };
//! let df = |x: &DenseND<f64>, g: &DenseND<f64>| -> anyhow::Result<DenseND<f64>> {
//!     let (_, ctx) = resize_forward(x, Some((4.0, 4.0)), None, mode, None)?;
//!     Ok(ctx.backward(g)?)
//! };
//!
//! let x = DenseND::random_uniform(&[1, 1, 4, 4], -1.0, 1.0);
//! let g = DenseND::random_uniform(&[1, 1, 4, 4], -1.0, 1.0);
//! let result = check_gradient(f, df, &x, &g, &GradCheckConfig::default()).unwrap();
//! assert!(result.passed);
//! ```

use anyhow::{anyhow, Result};
use scirs2_core::numeric::{Float, FromPrimitive};
use tenseg_core::DenseND;

/// Gradient checking configuration
#[derive(Debug, Clone)]
pub struct GradCheckConfig {
    /// Step size for finite differences (default: 1e-5)
    pub epsilon: f64,

    /// Relative tolerance for gradient comparison (default: 1e-3)
    pub rtol: f64,

    /// Absolute tolerance for gradient comparison (default: 1e-5)
    pub atol: f64,

    /// Use central difference (more accurate but 2x slower)
    pub use_central_diff: bool,

    /// Log every mismatching element at info level
    pub verbose: bool,
}

impl Default for GradCheckConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-5,
            rtol: 1e-3,
            atol: 1e-5,
            use_central_diff: true,
            verbose: false,
        }
    }
}

/// Result of gradient checking
#[derive(Debug)]
pub struct GradCheckResult {
    /// Maximum absolute difference between analytical and numerical gradients
    pub max_abs_diff: f64,

    /// Maximum relative difference
    pub max_rel_diff: f64,

    /// Whether the gradient check passed
    pub passed: bool,

    /// Number of elements checked
    pub num_elements: usize,

    /// Number of elements that failed the check
    pub num_failures: usize,
}

/// Check gradient using finite differences
///
/// # Arguments
///
/// * `f` - Forward function: x -> y
/// * `df` - Gradient function: (x, grad_y) -> grad_x
/// * `x` - Input tensor to check gradients at
/// * `grad_y` - Upstream gradient (∂L/∂y)
/// * `config` - Gradient checking configuration
pub fn check_gradient<T, F, G>(
    f: F,
    df: G,
    x: &DenseND<T>,
    grad_y: &DenseND<T>,
    config: &GradCheckConfig,
) -> Result<GradCheckResult>
where
    T: Float + FromPrimitive + std::fmt::Display,
    F: Fn(&DenseND<T>) -> Result<DenseND<T>>,
    G: Fn(&DenseND<T>, &DenseND<T>) -> Result<DenseND<T>>,
{
    let analytical_grad = df(x, grad_y)?;

    anyhow::ensure!(
        analytical_grad.shape() == x.shape(),
        "Gradient shape {:?} doesn't match input shape {:?}",
        analytical_grad.shape(),
        x.shape()
    );

    let numerical_grad = numerical_gradient(f, x, grad_y, config)?;
    compare_gradients(&analytical_grad, &numerical_grad, config)
}

/// Directional finite-difference gradient of `<grad_y, f(x)>`
fn numerical_gradient<T, F>(
    f: F,
    x: &DenseND<T>,
    grad_y: &DenseND<T>,
    config: &GradCheckConfig,
) -> Result<DenseND<T>>
where
    T: Float + FromPrimitive,
    F: Fn(&DenseND<T>) -> Result<DenseND<T>>,
{
    let epsilon = T::from_f64(config.epsilon).ok_or_else(|| anyhow!("Failed to convert epsilon"))?;
    let mut numerical_grad = DenseND::zeros(x.shape());
    let baseline = if config.use_central_diff {
        None
    } else {
        Some(f(x)?)
    };

    for idx in 0..x.len() {
        let multi_idx = x.linear_to_multi_index(idx);
        let perturbed = |delta: T| -> Result<DenseND<T>> {
            let mut shifted = x.clone();
            let slot = shifted
                .get_mut(&multi_idx)
                .ok_or_else(|| anyhow!("Index error at {:?}", multi_idx))?;
            *slot = *slot + delta;
            f(&shifted)
        };

        let y_plus = perturbed(epsilon)?;
        let contribution = match baseline.as_ref() {
            None => {
                let y_minus = perturbed(-epsilon)?;
                let slope = y_plus.sub(&y_minus)?.scalar_mul(T::one() / (epsilon + epsilon));
                grad_y.dot(&slope)?
            }
            Some(y) => {
                let slope = y_plus.sub(y)?.scalar_mul(T::one() / epsilon);
                grad_y.dot(&slope)?
            }
        };

        *numerical_grad
            .get_mut(&multi_idx)
            .ok_or_else(|| anyhow!("Index error at {:?}", multi_idx))? = contribution;
    }

    Ok(numerical_grad)
}

fn compare_gradients<T>(
    analytical: &DenseND<T>,
    numerical: &DenseND<T>,
    config: &GradCheckConfig,
) -> Result<GradCheckResult>
where
    T: Float + FromPrimitive + std::fmt::Display,
{
    let rtol = T::from_f64(config.rtol).ok_or_else(|| anyhow!("Failed to convert rtol"))?;
    let atol = T::from_f64(config.atol).ok_or_else(|| anyhow!("Failed to convert atol"))?;

    let mut max_abs_diff = 0.0_f64;
    let mut max_rel_diff = 0.0_f64;
    let mut num_failures = 0;

    for (idx, (&a_val, &n_val)) in analytical.iter().zip(numerical.iter()).enumerate() {
        let abs_diff = (a_val - n_val).abs();
        let rel_diff = if n_val.abs() > T::epsilon() {
            abs_diff / n_val.abs()
        } else {
            abs_diff
        };

        max_abs_diff = max_abs_diff.max(abs_diff.to_f64().unwrap_or(f64::INFINITY));
        max_rel_diff = max_rel_diff.max(rel_diff.to_f64().unwrap_or(f64::INFINITY));

        if abs_diff > atol && rel_diff > rtol {
            num_failures += 1;
            if config.verbose {
                log::info!(
                    "gradient mismatch at {:?}: analytical={}, numerical={}, abs_diff={}, rel_diff={}",
                    analytical.linear_to_multi_index(idx),
                    a_val,
                    n_val,
                    abs_diff,
                    rel_diff
                );
            }
        }
    }

    let passed = num_failures == 0;
    if config.verbose {
        log::info!(
            "gradient check {}: {}/{} elements out of tolerance, max abs {:.2e}, max rel {:.2e}",
            if passed { "passed" } else { "failed" },
            num_failures,
            analytical.len(),
            max_abs_diff,
            max_rel_diff
        );
    }

    Ok(GradCheckResult {
        max_abs_diff,
        max_rel_diff,
        passed,
        num_elements: analytical.len(),
        num_failures,
    })
}
