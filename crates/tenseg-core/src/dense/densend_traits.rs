//! # DenseND - Trait Implementations
//!
//! - `Index` / `IndexMut` over `&[usize]`
//! - `Debug` (shape and rank only, feature maps are too large to print)

use super::types::DenseND;
use scirs2_core::ndarray_ext::IxDyn;
use std::fmt;

impl<T> std::ops::Index<&[usize]> for DenseND<T> {
    type Output = T;
    fn index(&self, index: &[usize]) -> &Self::Output {
        &self.data[IxDyn(index)]
    }
}

impl<T> std::ops::IndexMut<&[usize]> for DenseND<T> {
    fn index_mut(&mut self, index: &[usize]) -> &mut Self::Output {
        &mut self.data[IxDyn(index)]
    }
}

impl<T> fmt::Debug for DenseND<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DenseND")
            .field("shape", &self.data.shape())
            .field("rank", &self.data.ndim())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_and_debug() {
        let mut t = DenseND::<f64>::zeros(&[1, 2, 2, 2]);
        t[&[0, 1, 0, 1]] = 7.0;
        assert_eq!(t[&[0, 1, 0, 1]], 7.0);

        let printed = format!("{:?}", t);
        assert!(printed.contains("[1, 2, 2, 2]"));
        assert!(printed.contains("rank: 4"));
    }
}
