//! Tensor creation and initialization methods
//!
//! Random fills used by weight initialisation. All randomness goes through
//! `scirs2_core::random`.

use super::types::DenseND;
use scirs2_core::ndarray_ext::{Array, IxDyn};
use scirs2_core::numeric::{Float, FromPrimitive, Num};
use scirs2_core::random::quick::random_f64;

impl<T> DenseND<T>
where
    T: Float + FromPrimitive,
{
    /// Create a tensor with random values from a uniform distribution on `[low, high)`
    ///
    /// # Examples
    ///
    /// ```
    /// use tenseg_core::DenseND;
    ///
    /// let tensor = DenseND::<f32>::random_uniform(&[4, 3, 1, 1], -0.5, 0.5);
    /// assert_eq!(tensor.shape(), &[4, 3, 1, 1]);
    /// assert!(tensor.iter().all(|&v| (-0.5..0.5).contains(&v)));
    /// ```
    pub fn random_uniform(shape: &[usize], low: f64, high: f64) -> Self {
        let range = high - low;
        let data = Array::from_shape_simple_fn(IxDyn(shape), || {
            cast(low + random_f64() * range)
        });
        Self { data }
    }

    /// Create a tensor with random values from a normal distribution
    ///
    /// Samples are drawn with the Box-Muller transform.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenseg_core::DenseND;
    ///
    /// let tensor = DenseND::<f64>::random_normal(&[8, 4, 3, 3], 0.0, 0.01);
    /// assert_eq!(tensor.len(), 8 * 4 * 3 * 3);
    /// ```
    pub fn random_normal(shape: &[usize], mean: f64, std: f64) -> Self {
        let data = Array::from_shape_simple_fn(IxDyn(shape), || {
            // 1 - u keeps the logarithm argument in (0, 1]
            let u1 = 1.0 - random_f64();
            let u2 = random_f64();
            let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
            cast(mean + std * z0)
        });
        Self { data }
    }

    /// Fill every element in place with samples drawn by `sample`
    pub fn fill_random<F>(&mut self, mut sample: F)
    where
        F: FnMut() -> f64,
    {
        self.data.mapv_inplace(|_| cast(sample()));
    }
}

impl<T> DenseND<T>
where
    T: Clone + Num,
{
    /// Create a tensor filled with a specific value
    ///
    /// Alias for `from_elem`, kept for NumPy-style call sites.
    pub fn full(shape: &[usize], value: T) -> Self {
        Self::from_elem(shape, value)
    }
}

fn cast<T: Float + FromPrimitive>(value: f64) -> T {
    T::from_f64(value).unwrap_or_else(T::nan)
}
