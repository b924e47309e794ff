use ndarray::{Array1, Array2};

use crate::error::{NetError, Result};

use super::matrix::{from_column_major, to_column_major};
use super::size::Size;

/// Immutable pair of a shape and a flat value buffer.
///
/// Values are laid out column-major within each kernel slice, with kernel
/// slices concatenated. Every transform returns a new tensor; the buffer is
/// never mutated in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    size: Size,
    value: Array1<f32>,
}

impl Tensor {
    /// Builds a tensor, failing when the buffer length does not match the
    /// declared size.
    pub fn new(size: Size, value: impl Into<Array1<f32>>) -> Result<Self> {
        let value = value.into();
        if size.total_length() != value.len() {
            return Err(NetError::ShapeMismatch(format!(
                "tensor value length {} does not match declared size {} with total length {}",
                value.len(),
                size,
                size.total_length()
            )));
        }
        Ok(Tensor { size, value })
    }

    /// 1-d tensor over the given values.
    pub fn from_vector(values: impl Into<Array1<f32>>) -> Self {
        let value = values.into();
        let size = Size::new([value.len()]);
        Tensor { size, value }
    }

    pub fn scalar(value: f32) -> Self {
        Self::from_vector(vec![value])
    }

    /// 2-d tensor laid out column-major from the given matrix.
    pub fn from_matrix(matrix: &Array2<f32>) -> Self {
        let (rows, columns) = matrix.dim();
        Tensor {
            size: Size::new([columns, rows]),
            value: Array1::from_vec(to_column_major(matrix)),
        }
    }

    pub fn size(&self) -> &Size {
        &self.size
    }

    pub fn value(&self) -> &Array1<f32> {
        &self.value
    }

    pub fn map(&self, f: impl Fn(f32) -> f32) -> Tensor {
        Tensor {
            size: self.size.clone(),
            value: self.value.mapv(f),
        }
    }

    /// The tensor as a 2-d matrix, iff the dimensionality supports it
    /// (at most 2-d, or 3-d with a trailing size-1 axis).
    pub fn to_matrix(&self) -> Result<Array2<f32>> {
        let dimensions = self.size.dimensions();
        let single_layer_3d = dimensions.len() == 3 && dimensions[2] == 1;
        if dimensions.len() > 2 && !single_layer_3d {
            return Err(NetError::ShapeMismatch(format!(
                "cannot convert a {}d tensor into a 2d matrix",
                dimensions.len()
            )));
        }
        let rows = self.size.rows();
        let columns = self.size.columns();
        Ok(from_column_major(rows, columns, &self.value, 0))
    }

    /// Partitions the buffer into one 2-d matrix per kernel slice.
    pub fn to_matrices(&self) -> Result<Vec<Array2<f32>>> {
        if self.size.dimensions().len() > 2 {
            return Err(NetError::ShapeMismatch(format!(
                "tensor size {} must be 1d or 2d (with kernels) to convert to matrices",
                self.size
            )));
        }
        let rows = self.size.rows();
        let columns = self.size.columns();
        let slice_length = self.size.length();
        Ok((0..self.size.kernel_count())
            .map(|k| from_column_major(rows, columns, &self.value, k * slice_length))
            .collect())
    }
}
