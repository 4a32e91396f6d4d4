// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor shape descriptors and dimension utilities.

use std::fmt;

/// Describes the dimensionality of a tensor.
///
/// Shapes are immutable once created. Dimensions are listed outermost
/// first, so the last dimension is contiguous in memory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    /// Creates a new shape from the given dimensions.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::Shape;
    /// let s = Shape::new(vec![2, 3, 4]);
    /// assert_eq!(s.rank(), 3);
    /// assert_eq!(s.num_elements(), 24);
    /// ```
    pub fn new(dims: Vec<usize>) -> Self {
        Self { dims }
    }

    /// Creates a scalar shape (rank 0).
    pub fn scalar() -> Self {
        Self { dims: vec![] }
    }

    /// Creates a 1-D shape.
    pub fn vector(len: usize) -> Self {
        Self { dims: vec![len] }
    }

    /// Creates a 2-D shape (matrix).
    pub fn matrix(rows: usize, cols: usize) -> Self {
        Self {
            dims: vec![rows, cols],
        }
    }

    /// Returns the number of dimensions (rank).
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Returns the total number of elements.
    ///
    /// For a scalar shape (rank 0), returns 1.
    pub fn num_elements(&self) -> usize {
        if self.dims.is_empty() {
            1
        } else {
            self.dims.iter().product()
        }
    }

    /// Returns the dimensions as a slice.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Returns the innermost (fastest-varying) dimension, or 1 for a scalar.
    pub fn innermost(&self) -> usize {
        self.dims.last().copied().unwrap_or(1)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, "]")
    }
}

/// Convenience: `Shape::from(vec![2, 3])`.
impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Self::new(dims)
    }
}

/// Convenience: `Shape::from(&[2, 3][..])`.
impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Self::new(dims.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_shape() {
        let s = Shape::scalar();
        assert_eq!(s.rank(), 0);
        assert_eq!(s.num_elements(), 1);
    }

    #[test]
    fn test_vector_shape() {
        let s = Shape::vector(5);
        assert_eq!(s.rank(), 1);
        assert_eq!(s.num_elements(), 5);
    }

    #[test]
    fn test_matrix_shape() {
        let s = Shape::matrix(3, 4);
        assert_eq!(s.rank(), 2);
        assert_eq!(s.num_elements(), 12);
    }

    #[test]
    fn test_innermost() {
        assert_eq!(Shape::scalar().innermost(), 1);
        assert_eq!(Shape::new(vec![2, 3, 4]).innermost(), 4);
    }

    #[test]
    fn test_display() {
        let s = Shape::new(vec![2, 3, 4]);
        assert_eq!(format!("{s}"), "[2, 3, 4]");
    }

    #[test]
    fn test_from_conversions() {
        let s1: Shape = vec![2, 3].into();
        let s2: Shape = (&[2, 3][..]).into();
        assert_eq!(s1, s2);
    }
}
