//! Element-wise operations on dense tensors
//!
//! Binary operations here require identical shapes. Feature maps in this
//! crate are never broadcast implicitly; a shape difference is a bug in the
//! caller and is reported as an error.

use super::types::DenseND;
use scirs2_core::ndarray_ext::Zip;
use scirs2_core::numeric::{Float, FromPrimitive, Num};

impl<T> DenseND<T>
where
    T: Clone + Num,
{
    /// Apply a function to every element, producing a new tensor
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(T) -> T,
    {
        Self {
            data: self.data.mapv(f),
        }
    }

    /// Apply a function to every element in place
    pub fn map_inplace<F>(&mut self, f: F)
    where
        F: Fn(T) -> T,
    {
        self.data.mapv_inplace(f);
    }

    /// Set every element to `value`
    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    fn ensure_same_shape(&self, other: &Self, op: &str) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.same_shape(other),
            "{}: shape mismatch {:?} vs {:?}",
            op,
            self.shape(),
            other.shape()
        );
        Ok(())
    }

    /// Element-wise sum of two tensors with identical shapes
    pub fn add(&self, other: &Self) -> anyhow::Result<Self> {
        self.ensure_same_shape(other, "add")?;
        let mut data = self.data.clone();
        Zip::from(&mut data)
            .and(&other.data)
            .for_each(|a, b| *a = a.clone() + b.clone());
        Ok(Self { data })
    }

    /// Element-wise difference of two tensors with identical shapes
    ///
    /// # Examples
    ///
    /// ```
    /// use tenseg_core::DenseND;
    ///
    /// let a = DenseND::from_vec(vec![3.0, 5.0], &[2]).unwrap();
    /// let b = DenseND::from_vec(vec![1.0, 2.0], &[2]).unwrap();
    /// assert_eq!(a.sub(&b).unwrap().to_vec(), vec![2.0, 3.0]);
    /// assert!(a.sub(&DenseND::zeros(&[3])).is_err());
    /// ```
    pub fn sub(&self, other: &Self) -> anyhow::Result<Self> {
        self.ensure_same_shape(other, "sub")?;
        let mut data = self.data.clone();
        Zip::from(&mut data)
            .and(&other.data)
            .for_each(|a, b| *a = a.clone() - b.clone());
        Ok(Self { data })
    }

    /// Multiply every element by a scalar
    pub fn scalar_mul(&self, scalar: T) -> Self {
        self.map(|v| v * scalar.clone())
    }

    /// Sum of element-wise products (Frobenius inner product)
    pub fn dot(&self, other: &Self) -> anyhow::Result<T> {
        self.ensure_same_shape(other, "dot")?;
        Ok(self
            .data
            .iter()
            .zip(other.data.iter())
            .fold(T::zero(), |acc, (a, b)| acc + a.clone() * b.clone()))
    }
}

impl<T> DenseND<T>
where
    T: Float + FromPrimitive,
{
    /// Rectified linear unit: `max(0, x)`
    ///
    /// # Examples
    ///
    /// ```
    /// use tenseg_core::DenseND;
    ///
    /// let x = DenseND::from_vec(vec![-1.0, 0.0, 2.0], &[3]).unwrap();
    /// assert_eq!(x.relu().to_vec(), vec![0.0, 0.0, 2.0]);
    /// ```
    pub fn relu(&self) -> Self {
        self.map(|v| if v > T::zero() { v } else { T::zero() })
    }

    /// Arithmetic mean of all elements (zero for an empty tensor)
    pub fn mean(&self) -> T {
        if self.is_empty() {
            return T::zero();
        }
        let sum = self.data.iter().fold(T::zero(), |acc, &v| acc + v);
        sum / T::from_usize(self.len()).unwrap_or_else(T::one)
    }

    /// Largest absolute element-wise difference between two tensors
    pub fn max_abs_diff(&self, other: &Self) -> anyhow::Result<T> {
        self.ensure_same_shape(other, "max_abs_diff")?;
        Ok(self
            .data
            .iter()
            .zip(other.data.iter())
            .fold(T::zero(), |acc, (&a, &b)| acc.max((a - b).abs())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_scalar_mul() {
        let a = DenseND::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
        let b = DenseND::<f64>::ones(&[2, 2]);
        let sum = a.add(&b).unwrap();
        assert_eq!(sum.to_vec(), vec![2.0, 3.0, 4.0, 5.0]);
        assert_eq!(sum.scalar_mul(0.5).to_vec(), vec![1.0, 1.5, 2.0, 2.5]);
    }

    #[test]
    fn test_dot_and_mean() {
        let a = DenseND::from_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap();
        let b = DenseND::from_vec(vec![4.0, 5.0, 6.0], &[3]).unwrap();
        assert_eq!(a.dot(&b).unwrap(), 32.0);
        assert_eq!(a.mean(), 2.0);
    }

    #[test]
    fn test_binary_ops_reject_shape_mismatch() {
        let a = DenseND::<f64>::zeros(&[2, 3]);
        let b = DenseND::<f64>::zeros(&[3, 2]);
        assert!(a.add(&b).is_err());
        assert!(a.dot(&b).is_err());
        assert!(a.max_abs_diff(&b).is_err());
    }

    #[test]
    fn test_max_abs_diff() {
        let a = DenseND::from_vec(vec![1.0, -2.0, 3.0], &[3]).unwrap();
        let b = DenseND::from_vec(vec![1.5, -2.0, 0.0], &[3]).unwrap();
        assert_eq!(a.max_abs_diff(&b).unwrap(), 3.0);
    }
}
