use std::sync::Mutex;

use ndarray::{s, Array2};

use crate::algebra::convolution::{convolve, convolve_transpose};
use crate::algebra::matrix::{
    append_columns, rotate180, split_by_column, to_column_major, WeightInit,
};
use crate::algebra::{Size, Tensor};
use crate::error::{NetError, Result};
use crate::training::run::missing;
use crate::training::TrainingRun;

use super::HasWeights;

/// Convolutional layer, covering both the ordinary (size-reducing) and the
/// transpose (size-enlarging) direction.
///
/// A layer is in transpose mode iff its output holds more values than its
/// input; in that mode the weights are rotated 180 degrees before use on both
/// passes. The weight matrix is `(weight rows, weight columns x output kernel
/// count)`, one column block per output kernel.
#[derive(Debug)]
pub struct ConvolutionalLayer {
    input_size: Size,
    output_size: Size,
    weights: Mutex<Array2<f32>>,
    stride: Vec<usize>,
    padding: Vec<usize>,
    is_transpose: bool,
}

impl ConvolutionalLayer {
    pub fn new(
        input_size: Size,
        output_size: Size,
        weight_length: &[usize],
        stride: &[usize],
        padding: &[usize],
    ) -> Result<Self> {
        guard_dimensions(&input_size, &output_size)?;
        guard_arrays(&input_size, weight_length, stride, padding)?;

        let is_transpose = output_size.total_length() > input_size.total_length();

        let weight_columns = weight_length[0];
        let weight_rows = if weight_length.len() == 1 {
            1
        } else {
            weight_length[1]
        };
        let weights =
            WeightInit::Xavier.matrix(weight_rows, weight_columns * output_size.kernel_count());

        Ok(ConvolutionalLayer {
            input_size,
            output_size,
            weights: Mutex::new(weights),
            stride: stride.to_vec(),
            padding: padding.to_vec(),
            is_transpose,
        })
    }

    pub fn input_size(&self) -> &Size {
        &self.input_size
    }

    pub fn output_size(&self) -> &Size {
        &self.output_size
    }

    pub fn is_transpose(&self) -> bool {
        self.is_transpose
    }

    pub(crate) fn feed_forwards(&self, input: &Tensor) -> Result<Tensor> {
        let weights = self.weights.lock().unwrap().clone();
        let weight_slices: Vec<Array2<f32>> =
            split_by_column(&weights, self.output_size.kernel_count())?
                .into_iter()
                .map(|w| if self.is_transpose { rotate180(&w) } else { w })
                .collect();
        let input_slices = input.to_matrices()?;

        let correlated = self.cartesian_convolve(&weight_slices, &input_slices);
        Tensor::new(self.output_size.clone(), to_column_major(&correlated))
    }

    pub(crate) fn back_propagate(&self, run: &mut TrainingRun) -> Result<()> {
        let error_slices: Vec<Array2<f32>> = run
            .output_error()
            .ok_or_else(|| missing("output error"))?
            .to_matrices()?
            .into_iter()
            .map(|m| if self.is_transpose { rotate180(&m) } else { m })
            .collect();
        let input_slices = run.input().ok_or_else(|| missing("input"))?.to_matrices()?;

        let delta = self.cartesian_convolve(&error_slices, &input_slices);
        let input_error = self.matrixwise_convolve_transpose(&error_slices)?;

        run.set_input_error(Tensor::new(self.input_size.clone(), input_error)?);
        run.set_weights_delta(self.tile_to_weight_shape(&delta));
        Ok(())
    }

    /// Convolves every `f` against every `g`, averaging over the `g`s and
    /// concatenating the per-`f` results by columns. The division by the
    /// input-kernel count (rather than a plain sum) is deliberate; the layer
    /// size and delta formulas assume it.
    fn cartesian_convolve(&self, fs: &[Array2<f32>], gs: &[Array2<f32>]) -> Array2<f32> {
        let col_stride = self.stride[0];
        let row_stride = if self.stride.len() > 1 { self.stride[1] } else { 1 };
        let col_padding = self.padding[0];
        let row_padding = if self.padding.len() > 1 { self.padding[1] } else { 0 };

        let blocks: Vec<Array2<f32>> = fs
            .iter()
            .map(|f| {
                let mut sum = convolve(f, &gs[0], row_stride, col_stride, row_padding, col_padding);
                for g in &gs[1..] {
                    sum = sum + convolve(f, g, row_stride, col_stride, row_padding, col_padding);
                }
                sum / gs.len() as f32
            })
            .collect();
        append_columns(&blocks)
    }

    /// Pairs each output kernel's weight slice with its error slice via
    /// transpose correlation, averages over the output kernels and repeats
    /// the result per input kernel. The padding makes the result match the
    /// layer's input shape.
    fn matrixwise_convolve_transpose(&self, error_slices: &[Array2<f32>]) -> Result<Vec<f32>> {
        let weights = self.weights.lock().unwrap().clone();
        let weight_slices = split_by_column(&weights, self.output_size.kernel_count())?;
        if weight_slices.len() != error_slices.len() {
            return Err(NetError::ShapeMismatch(format!(
                "{} output error kernels do not match the layer's {} weight slices",
                error_slices.len(),
                weight_slices.len()
            )));
        }

        let slice_rows = weight_slices[0].nrows() as isize;
        let slice_cols = weight_slices[0].ncols() as isize;
        let row_padding = padding_to_input(
            self.input_size.rows() as isize,
            self.output_size.rows() as isize,
            slice_rows,
        );
        let col_padding = padding_to_input(
            self.input_size.columns() as isize,
            self.output_size.columns() as isize,
            slice_cols,
        );

        let mut sum = convolve_transpose(
            &weight_slices[0],
            &error_slices[0],
            Some(row_padding),
            Some(col_padding),
        );
        for i in 1..weight_slices.len() {
            sum = sum
                + convolve_transpose(
                    &weight_slices[i],
                    &error_slices[i],
                    Some(row_padding),
                    Some(col_padding),
                );
        }
        let averaged = sum / self.output_size.kernel_count() as f32;

        let per_input_kernel: Vec<Array2<f32>> = (0..self.input_size.kernel_count())
            .map(|_| averaged.clone())
            .collect();
        Ok(to_column_major(&append_columns(&per_input_kernel)))
    }

    /// Tiles a correlated delta across the full weight matrix shape when it
    /// comes out smaller; with the standard padding formulas the shapes
    /// already match and this is a copy.
    fn tile_to_weight_shape(&self, delta: &Array2<f32>) -> Array2<f32> {
        let (weight_rows, weight_cols) = self.weights.lock().unwrap().dim();
        let (delta_rows, delta_cols) = delta.dim();

        let mut full = Array2::zeros((weight_rows, weight_cols));
        if delta_rows == 0 || delta_cols == 0 {
            return full;
        }
        for r in 0..weight_rows / delta_rows {
            for c in 0..weight_cols / delta_cols {
                full.slice_mut(s![
                    r * delta_rows..(r + 1) * delta_rows,
                    c * delta_cols..(c + 1) * delta_cols
                ])
                .assign(delta);
            }
        }
        full
    }
}

fn padding_to_input(input_len: isize, output_len: isize, weight_len: isize) -> usize {
    ((input_len - output_len + weight_len - 1) / 2).max(0) as usize
}

fn guard_dimensions(input_size: &Size, output_size: &Size) -> Result<()> {
    if input_size.dimensions().len() != output_size.dimensions().len() {
        return Err(NetError::InvalidArgument(
            "the number of input and output dimensions must match".into(),
        ));
    }

    let is_transpose = output_size.total_length() > input_size.total_length();

    for (i, (&input_dim, &output_dim)) in input_size
        .dimensions()
        .iter()
        .zip(output_size.dimensions())
        .enumerate()
    {
        if input_dim < 1 {
            return Err(NetError::InvalidArgument(format!(
                "input dimension {i} cannot be less than 1"
            )));
        }
        if output_dim < 1 {
            return Err(NetError::InvalidArgument(format!(
                "output dimension {i} cannot be less than 1"
            )));
        }
        if is_transpose && output_dim < input_dim {
            return Err(NetError::InvalidArgument(format!(
                "output dimension {i} cannot be smaller than its input dimension for a transpose convolution"
            )));
        }
        if !is_transpose && input_dim < output_dim {
            return Err(NetError::InvalidArgument(format!(
                "output dimension {i} cannot exceed its input dimension for an ordinary convolution"
            )));
        }
    }
    Ok(())
}

fn guard_arrays(
    input_size: &Size,
    weight_length: &[usize],
    stride: &[usize],
    padding: &[usize],
) -> Result<()> {
    let dimension_count = input_size.dimensions().len();

    if weight_length.len() != dimension_count {
        return Err(NetError::InvalidArgument(format!(
            "weight length array dimensions ({}) must be the same as the input ({dimension_count})",
            weight_length.len()
        )));
    }
    if stride.len() != dimension_count {
        return Err(NetError::InvalidArgument(format!(
            "stride array dimensions ({}) must be the same as the input ({dimension_count})",
            stride.len()
        )));
    }
    if padding.len() != dimension_count {
        return Err(NetError::InvalidArgument(format!(
            "padding array dimensions ({}) must be the same as the input ({dimension_count})",
            padding.len()
        )));
    }
    if weight_length.iter().any(|&l| l < 1) {
        return Err(NetError::InvalidArgument(
            "weight lengths cannot be less than 1".into(),
        ));
    }
    if stride.iter().any(|&s| s < 1) {
        return Err(NetError::InvalidArgument(
            "strides cannot be less than 1".into(),
        ));
    }
    Ok(())
}

impl HasWeights for ConvolutionalLayer {
    fn get_weights(&self) -> Array2<f32> {
        self.weights.lock().unwrap().clone()
    }

    fn set_weights(&self, weights: Array2<f32>) {
        *self.weights.lock().unwrap() = weights;
    }

    fn update_weights(&self, update: &mut dyn FnMut(Array2<f32>) -> Array2<f32>) {
        let mut guard = self.weights.lock().unwrap();
        let updated = update(guard.clone());
        *guard = updated;
    }
}
