//! Dense tensor type definition and basic operations
//!
//! This module defines the core `DenseND<T>` type and provides basic creation
//! and accessor methods. Spatial, elementwise and convolution operations are
//! organized in sibling modules.

use scirs2_core::ndarray_ext::{Array, ArrayView, ArrayViewMut, IxDyn};
use scirs2_core::numeric::Num;

/// Dense N-dimensional tensor backed by scirs2_core's ndarray
///
/// Feature maps use the `(batch, channel, height, width)` layout; the spatial
/// axes are always indices 2 and 3.
///
/// # Type Parameters
///
/// * `T` - The element type (typically `f32` or `f64`)
///
/// # Examples
///
/// ```
/// use tenseg_core::DenseND;
///
/// let tensor = DenseND::<f64>::zeros(&[1, 3, 8, 8]);
/// assert_eq!(tensor.shape(), &[1, 3, 8, 8]);
/// assert_eq!(tensor.rank(), 4);
/// ```
#[derive(Clone)]
pub struct DenseND<T> {
    /// Underlying ndarray storage (via scirs2_core)
    pub(crate) data: Array<T, IxDyn>,
}

impl<T> DenseND<T>
where
    T: Clone + Num,
{
    /// Create a tensor from an existing ndarray
    pub fn from_array(array: Array<T, IxDyn>) -> Self {
        Self { data: array }
    }

    /// Create a tensor from a vector with given shape
    ///
    /// # Arguments
    ///
    /// * `vec` - Flattened data in row-major order
    /// * `shape` - Target shape
    ///
    /// # Examples
    ///
    /// ```
    /// use tenseg_core::DenseND;
    ///
    /// let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
    /// let tensor = DenseND::from_vec(data, &[2, 3]).unwrap();
    /// assert_eq!(tensor.shape(), &[2, 3]);
    /// ```
    pub fn from_vec(vec: Vec<T>, shape: &[usize]) -> anyhow::Result<Self> {
        let total: usize = shape.iter().product();
        if vec.len() != total {
            anyhow::bail!(
                "Shape {:?} requires {} elements, but got {}",
                shape,
                total,
                vec.len()
            );
        }
        let array = Array::from_shape_vec(IxDyn(shape), vec)?;
        Ok(Self { data: array })
    }

    /// Get the rank (number of dimensions) of this tensor
    pub fn rank(&self) -> usize {
        self.data.ndim()
    }

    /// Get the shape of this tensor
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Get the total number of elements
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the tensor is empty (has zero elements)
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get a copy of the shape as a vector.
    pub fn shape_vec(&self) -> Vec<usize> {
        self.shape().to_vec()
    }

    /// Spatial size `(height, width)` of an NCHW feature map.
    ///
    /// # Errors
    ///
    /// Fails when the tensor is not rank 4.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenseg_core::DenseND;
    ///
    /// let x = DenseND::<f32>::zeros(&[2, 16, 32, 24]);
    /// assert_eq!(x.spatial_size().unwrap(), (32, 24));
    /// assert!(DenseND::<f32>::zeros(&[32, 24]).spatial_size().is_err());
    /// ```
    pub fn spatial_size(&self) -> anyhow::Result<(usize, usize)> {
        anyhow::ensure!(
            self.rank() == 4,
            "Expected an NCHW feature map (rank 4), got rank {} with shape {:?}",
            self.rank(),
            self.shape()
        );
        Ok((self.shape()[2], self.shape()[3]))
    }

    /// Get an immutable reference to the underlying ndarray
    pub fn as_array(&self) -> &Array<T, IxDyn> {
        &self.data
    }

    /// Get a mutable reference to the underlying ndarray
    pub fn as_array_mut(&mut self) -> &mut Array<T, IxDyn> {
        &mut self.data
    }

    /// Get an immutable view of the tensor
    pub fn view(&self) -> ArrayView<'_, T, IxDyn> {
        self.data.view()
    }

    /// Get a mutable view of the tensor
    pub fn view_mut(&mut self) -> ArrayViewMut<'_, T, IxDyn> {
        self.data.view_mut()
    }

    /// Create a tensor filled with a specific value
    pub fn from_elem(shape: &[usize], value: T) -> Self {
        Self {
            data: Array::from_elem(IxDyn(shape), value),
        }
    }

    /// Create a tensor of zeros
    ///
    /// # Examples
    ///
    /// ```
    /// use tenseg_core::DenseND;
    ///
    /// let tensor = DenseND::<f64>::zeros(&[2, 3, 4]);
    /// assert_eq!(tensor[&[0, 0, 0]], 0.0);
    /// ```
    pub fn zeros(shape: &[usize]) -> Self {
        Self {
            data: Array::zeros(IxDyn(shape)),
        }
    }

    /// Create a tensor of ones
    pub fn ones(shape: &[usize]) -> Self {
        Self {
            data: Array::ones(IxDyn(shape)),
        }
    }

    /// Convert the tensor to a flat vector in row-major order
    pub fn to_vec(&self) -> Vec<T> {
        self.data.iter().cloned().collect()
    }

    /// Create an iterator over all elements in row-major order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.data.iter()
    }

    /// Create a mutable iterator over all elements in row-major order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.data.iter_mut()
    }

    /// Check if two tensors have the same shape
    pub fn same_shape(&self, other: &Self) -> bool {
        self.shape() == other.shape()
    }

    /// Bounds-checked element access
    pub fn get(&self, index: &[usize]) -> Option<&T> {
        if index.len() != self.rank() {
            return None;
        }
        self.data.get(IxDyn(index))
    }

    /// Bounds-checked mutable element access
    pub fn get_mut(&mut self, index: &[usize]) -> Option<&mut T> {
        if index.len() != self.rank() {
            return None;
        }
        self.data.get_mut(IxDyn(index))
    }

    /// Convert a row-major linear offset into a multi-dimensional index
    ///
    /// # Examples
    ///
    /// ```
    /// use tenseg_core::DenseND;
    ///
    /// let tensor = DenseND::<f64>::zeros(&[2, 3, 4]);
    /// assert_eq!(tensor.linear_to_multi_index(0), vec![0, 0, 0]);
    /// assert_eq!(tensor.linear_to_multi_index(23), vec![1, 2, 3]);
    /// ```
    pub fn linear_to_multi_index(&self, linear: usize) -> Vec<usize> {
        let shape = self.shape();
        let mut index = vec![0; shape.len()];
        let mut remaining = linear;
        for d in (0..shape.len()).rev() {
            index[d] = remaining % shape[d];
            remaining /= shape[d];
        }
        index
    }
}
