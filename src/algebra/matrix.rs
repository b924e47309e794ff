use ndarray::{s, Array1, Array2};
use rand_distr::{Distribution, Normal};

use crate::error::{NetError, Result};

/// Weight initialization strategies.
#[derive(Debug, Clone, Copy)]
pub enum WeightInit {
    /// Xavier/Glorot: uniform in `±sqrt(6 / (rows + columns))`.
    Xavier,
    /// He: zero-mean normal with `sqrt(2 / fan_in)` standard deviation.
    HeNormal,
}

impl WeightInit {
    pub fn matrix(self, rows: usize, columns: usize) -> Array2<f32> {
        match self {
            WeightInit::Xavier => {
                let scale = (6.0 / (rows as f32 + columns as f32)).sqrt();
                Array2::from_shape_fn((rows, columns), |_| (fastrand::f32() * 2.0 - 1.0) * scale)
            }
            WeightInit::HeNormal => {
                let std_dev = (2.0 / columns as f32).sqrt();
                let normal = Normal::new(0.0, std_dev).unwrap();
                Array2::from_shape_fn((rows, columns), |_| normal.sample(&mut rand::rng()))
            }
        }
    }
}

/// Reverses both matrix axes: `result[r][c] = m[rows-1-r][cols-1-c]`.
pub fn rotate180(matrix: &Array2<f32>) -> Array2<f32> {
    let (rows, columns) = matrix.dim();
    Array2::from_shape_fn((rows, columns), |(r, c)| {
        matrix[[rows - r - 1, columns - c - 1]]
    })
}

/// Splits into `count` equal-width column blocks.
pub fn split_by_column(matrix: &Array2<f32>, count: usize) -> Result<Vec<Array2<f32>>> {
    if count == 0 || matrix.ncols() % count != 0 {
        return Err(NetError::InvalidArgument(format!(
            "matrix with {} columns does not evenly split into {} blocks",
            matrix.ncols(),
            count
        )));
    }
    let width = matrix.ncols() / count;
    Ok((0..count)
        .map(|i| matrix.slice(s![.., i * width..(i + 1) * width]).to_owned())
        .collect())
}

/// Concatenates matrices left to right. All parts must share a row count.
pub fn append_columns(parts: &[Array2<f32>]) -> Array2<f32> {
    let rows = parts[0].nrows();
    let columns = parts.iter().map(|p| p.ncols()).sum();
    let mut appended = Array2::zeros((rows, columns));
    let mut offset = 0;
    for part in parts {
        appended
            .slice_mut(s![.., offset..offset + part.ncols()])
            .assign(part);
        offset += part.ncols();
    }
    appended
}

pub fn outer_product(column: &Array1<f32>, row: &Array1<f32>) -> Array2<f32> {
    let lhs = column.view().into_shape_with_order((column.len(), 1)).unwrap();
    let rhs = row.view().into_shape_with_order((1, row.len())).unwrap();

    lhs.dot(&rhs)
}

/// Flattens a matrix into the column-major order tensors use.
pub fn to_column_major(matrix: &Array2<f32>) -> Vec<f32> {
    matrix.t().iter().copied().collect()
}

/// Reads a `rows x columns` matrix out of a column-major buffer.
pub fn from_column_major(rows: usize, columns: usize, values: &Array1<f32>, offset: usize) -> Array2<f32> {
    Array2::from_shape_fn((rows, columns), |(r, c)| values[offset + c * rows + r])
}
