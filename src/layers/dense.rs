use std::sync::Mutex;

use ndarray::{s, Array1, Array2};

use crate::algebra::matrix::{outer_product, WeightInit};
use crate::algebra::{Size, Tensor};
use crate::error::Result;
use crate::training::run::missing;
use crate::training::TrainingRun;

use super::HasWeights;

/// Fully-connected layer.
///
/// The weight matrix is `(output length, input length + 1)`; column 0 holds
/// the bias, applied to an implicit constant-1 leading input.
#[derive(Debug)]
pub struct DenseLayer {
    input_size: Size,
    output_size: Size,
    weights: Mutex<Array2<f32>>,
}

impl DenseLayer {
    pub fn new(input_size: Size, output_size: Size) -> Self {
        Self::with_init(input_size, output_size, WeightInit::Xavier)
    }

    pub fn with_init(input_size: Size, output_size: Size, init: WeightInit) -> Self {
        let weights = init.matrix(output_size.total_length(), input_size.total_length() + 1);
        DenseLayer {
            input_size,
            output_size,
            weights: Mutex::new(weights),
        }
    }

    pub fn from_lengths(input_length: usize, output_length: usize) -> Self {
        Self::new(Size::new([input_length]), Size::new([output_length]))
    }

    pub fn input_size(&self) -> &Size {
        &self.input_size
    }

    pub fn output_size(&self) -> &Size {
        &self.output_size
    }

    pub(crate) fn feed_forwards(&self, input: &Tensor) -> Result<Tensor> {
        let with_bias = prepend_bias_unit(input.value());
        let output = self.weights.lock().unwrap().dot(&with_bias);
        Tensor::new(self.output_size.clone(), output)
    }

    pub(crate) fn back_propagate(&self, run: &mut TrainingRun) -> Result<()> {
        let output_error = run
            .output_error()
            .ok_or_else(|| missing("output error"))?
            .value()
            .clone();
        let with_bias = prepend_bias_unit(run.input().ok_or_else(|| missing("input"))?.value());

        let full_error = self.weights.lock().unwrap().t().dot(&output_error);
        let input_error = full_error.slice(s![1..]).to_owned();

        run.set_input_error(Tensor::new(self.input_size.clone(), input_error)?);
        run.set_weights_delta(outer_product(&output_error, &with_bias));
        Ok(())
    }
}

fn prepend_bias_unit(value: &Array1<f32>) -> Array1<f32> {
    let mut with_bias = Array1::ones(value.len() + 1);
    with_bias.slice_mut(s![1..]).assign(value);
    with_bias
}

impl HasWeights for DenseLayer {
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
