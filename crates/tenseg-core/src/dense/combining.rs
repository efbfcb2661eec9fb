//! Tensor combining operations
//!
//! Channel-axis concatenation is how decode heads fuse pyramid branches with
//! the original feature map.

use super::types::DenseND;
use scirs2_core::ndarray_ext::Axis;
use scirs2_core::numeric::Num;

impl<T> DenseND<T>
where
    T: Clone + Num,
{
    /// Concatenate multiple tensors along an existing axis.
    ///
    /// All tensors must have the same shape except along the concatenation axis.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The tensor list is empty
    /// - Ranks or non-axis dimensions differ
    /// - Axis is out of bounds
    ///
    /// # Examples
    ///
    /// ```
    /// use tenseg_core::DenseND;
    ///
    /// let x = DenseND::<f64>::ones(&[1, 8, 4, 4]);
    /// let branch = DenseND::<f64>::zeros(&[1, 2, 4, 4]);
    ///
    /// let fused = DenseND::concatenate(&[x, branch], 1).unwrap();
    /// assert_eq!(fused.shape(), &[1, 10, 4, 4]);
    /// ```
    pub fn concatenate(tensors: &[Self], axis: usize) -> anyhow::Result<Self> {
        if tensors.is_empty() {
            anyhow::bail!("Cannot concatenate empty tensor list");
        }

        let rank = tensors[0].rank();
        if axis >= rank {
            anyhow::bail!("Axis {} out of bounds for rank {}", axis, rank);
        }

        let reference_shape = tensors[0].shape();
        for (i, tensor) in tensors.iter().enumerate().skip(1) {
            if tensor.rank() != rank {
                anyhow::bail!("Tensor {} has rank {}, expected {}", i, tensor.rank(), rank);
            }
            for (dim, (&s1, &s2)) in reference_shape
                .iter()
                .zip(tensor.shape().iter())
                .enumerate()
            {
                if dim != axis && s1 != s2 {
                    anyhow::bail!(
                        "Tensor {}: shape mismatch at dimension {}: {} vs {}",
                        i,
                        dim,
                        s1,
                        s2
                    );
                }
            }
        }

        let views: Vec<_> = tensors.iter().map(|t| t.data.view()).collect();
        let concatenated = scirs2_core::ndarray::concatenate(Axis(axis), &views)?;

        Ok(Self { data: concatenated })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concatenate_preserves_order() {
        let a = DenseND::<f64>::from_elem(&[1, 1, 2, 2], 1.0);
        let b = DenseND::<f64>::from_elem(&[1, 2, 2, 2], 2.0);
        let c = DenseND::<f64>::from_elem(&[1, 1, 2, 2], 3.0);
        let out = DenseND::concatenate(&[a, b, c], 1).unwrap();

        assert_eq!(out.shape(), &[1, 4, 2, 2]);
        assert_eq!(out[&[0, 0, 1, 1]], 1.0);
        assert_eq!(out[&[0, 1, 0, 0]], 2.0);
        assert_eq!(out[&[0, 2, 1, 0]], 2.0);
        assert_eq!(out[&[0, 3, 0, 1]], 3.0);
    }

    #[test]
    fn test_concatenate_errors() {
        let a = DenseND::<f64>::zeros(&[1, 2, 4, 4]);
        let b = DenseND::<f64>::zeros(&[1, 2, 3, 4]);
        assert!(DenseND::<f64>::concatenate(&[], 0).is_err());
        assert!(DenseND::concatenate(&[a.clone(), b], 1).is_err());
        assert!(DenseND::concatenate(&[a], 4).is_err());
    }
}
