use ndarray::Array2;
use rayon::prelude::*;

use crate::activation::Activation;
use crate::algebra::convolution::convolved_length;
use crate::algebra::{Size, Tensor};
use crate::error::{NetError, Result};
use crate::layers::{ActivationLayer, ConvolutionalLayer, DenseLayer, HasWeights, Layer};
use crate::training::run::missing;
use crate::training::TrainingRun;

/// Ordered composition of layers.
///
/// Built incrementally with the fluent methods below; the topology is treated
/// as immutable once training starts and only weight contents change.
#[derive(Debug)]
pub struct Net {
    layers: Vec<Layer>,
    input_size: Size,
    output_size: Size,
}

impl Net {
    pub fn new(input_size: Size) -> Self {
        Net {
            layers: Vec::new(),
            output_size: input_size.clone(),
            input_size,
        }
    }

    /// Appends a layer and adopts its output size as the net's.
    pub fn add(mut self, layer: Layer) -> Self {
        self.output_size = layer.output_size().clone();
        self.layers.push(layer);
        self
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn input_size(&self) -> &Size {
        &self.input_size
    }

    pub fn output_size(&self) -> &Size {
        &self.output_size
    }

    pub fn dense(self, output_size: Size) -> Self {
        let layer = DenseLayer::new(self.output_size.clone(), output_size);
        self.add(Layer::Dense(layer))
    }

    pub fn dense_len(self, output_length: usize) -> Self {
        self.dense(Size::new([output_length]))
    }

    pub fn activation(self, kind: Activation) -> Self {
        let layer = ActivationLayer::new(self.output_size.clone(), kind);
        self.add(Layer::Activation(layer))
    }

    pub fn sigmoid(self) -> Self {
        self.activation(Activation::Sigmoid)
    }

    pub fn relu(self) -> Self {
        self.activation(Activation::Relu)
    }

    pub fn tanh(self) -> Self {
        self.activation(Activation::TanH)
    }

    pub fn leaky_relu(self) -> Self {
        self.activation(Activation::LeakyRelu)
    }

    pub fn relu_sig(self) -> Self {
        self.activation(Activation::ReluSig)
    }

    /// Appends an ordinary convolution with `(w - 1) / 2` padding per axis
    /// and the given stride (1 per axis when not supplied).
    pub fn convolution(
        self,
        weight_lengths: &[usize],
        kernel_count: usize,
        stride: Option<&[usize]>,
    ) -> Result<Self> {
        let input_size = self.output_size.clone();
        let dimension_count = input_size.dimensions().len();
        guard_weight_lengths(weight_lengths)?;

        let stride: Vec<usize> = match stride {
            Some(values) => values.to_vec(),
            None => vec![1; dimension_count],
        };
        let padding: Vec<usize> = weight_lengths.iter().map(|&l| (l - 1) / 2).collect();

        let output_size = Size::with_kernels(
            inferred_output_dimensions(&input_size, weight_lengths, &padding, &stride)?,
            kernel_count,
        );

        let layer =
            ConvolutionalLayer::new(input_size, output_size, weight_lengths, &stride, &padding)?;
        Ok(self.add(Layer::Convolutional(layer)))
    }

    /// Appends a transpose convolution with stride 1 and full `w - 1`
    /// padding per axis, enlarging each axis by `w - 1`.
    pub fn convolution_transpose(
        self,
        weight_lengths: &[usize],
        kernel_count: usize,
    ) -> Result<Self> {
        let input_size = self.output_size.clone();
        let dimension_count = input_size.dimensions().len();
        guard_weight_lengths(weight_lengths)?;

        let stride = vec![1; dimension_count];
        let padding: Vec<usize> = weight_lengths.iter().map(|&l| l - 1).collect();

        let output_size = Size::with_kernels(
            inferred_output_dimensions(&input_size, weight_lengths, &padding, &stride)?,
            kernel_count,
        );

        let layer =
            ConvolutionalLayer::new(input_size, output_size, weight_lengths, &stride, &padding)?;
        Ok(self.add(Layer::Convolutional(layer)))
    }

    /// Pure inference: folds the input through every layer in order.
    pub fn feed_forwards(&self, input: &Tensor) -> Result<Tensor> {
        if input.size() != &self.input_size {
            return Err(NetError::ShapeMismatch(format!(
                "input tensor size {} differs from the net's declared input {}",
                input.size(),
                self.input_size
            )));
        }
        let mut current = input.clone();
        for layer in &self.layers {
            current = layer.feed_forwards(&current)?;
        }
        Ok(current)
    }

    /// Forward pass that records every intermediate input and output into a
    /// fresh single-example training run, so the backward traversal can
    /// reuse exactly the forward values.
    pub fn feed_forwards_training(&self, input: Tensor) -> Result<TrainingRun> {
        let mut run = TrainingRun::new(self.layers.len());
        run.set_batch_size(1);
        run.set_input(input);

        for i in 0..self.layers.len() {
            run.set_counter(i);
            let output = self.layers[i].feed_forwards(run.input().ok_or_else(|| missing("input"))?)?;
            run.set_output(output);
        }
        Ok(run)
    }

    /// Walks the layers from last to first, pointing the run's cursor at
    /// each layer before delegating.
    pub fn back_propagate(&self, run: &mut TrainingRun) -> Result<()> {
        for i in (0..self.layers.len()).rev() {
            run.set_counter(i);
            self.layers[i].back_propagate(run)?;
        }
        Ok(())
    }

    /// Applies a combined run's deltas: every weighted layer independently
    /// (and possibly in parallel) steps `W <- W - delta * (rate / batch)`.
    pub fn apply_training(&self, run: &TrainingRun, learning_rate: f32) {
        if run.batch_size() == 0 {
            return;
        }
        let scale = learning_rate / run.batch_size() as f32;

        self.layers
            .par_iter()
            .zip(run.weights_deltas().par_iter())
            .for_each(|(layer, delta)| {
                if let (Some(weighted), Some(delta)) = (layer.weights(), delta.as_ref()) {
                    weighted.update_weights(&mut |weights| weights - &(delta * scale));
                }
            });
    }

    /// Snapshot of all weighted layers' matrices, in layer order.
    pub fn get_weights(&self) -> Vec<Array2<f32>> {
        self.layers
            .iter()
            .filter_map(|layer| layer.weights())
            .map(|weighted| weighted.get_weights())
            .collect()
    }

    /// Restores all weighted layers' matrices, in layer order.
    pub fn set_weights(&self, weights: &[Array2<f32>]) -> Result<()> {
        let weighted: Vec<&dyn HasWeights> = self
            .layers
            .iter()
            .filter_map(|layer| layer.weights())
            .collect();
        if weighted.len() != weights.len() {
            return Err(NetError::InvalidArgument(format!(
                "{} weight matrices supplied for {} weighted layers",
                weights.len(),
                weighted.len()
            )));
        }
        for (layer, matrix) in weighted.into_iter().zip(weights) {
            layer.set_weights(matrix.clone());
        }
        Ok(())
    }
}

fn guard_weight_lengths(weight_lengths: &[usize]) -> Result<()> {
    if weight_lengths.iter().any(|&l| l < 1) {
        return Err(NetError::InvalidArgument(
            "weight lengths cannot be less than 1".into(),
        ));
    }
    Ok(())
}

fn inferred_output_dimensions(
    input_size: &Size,
    weight_lengths: &[usize],
    padding: &[usize],
    stride: &[usize],
) -> Result<Vec<usize>> {
    let dimension_count = input_size.dimensions().len();
    if weight_lengths.len() != dimension_count || stride.len() != dimension_count {
        return Err(NetError::InvalidArgument(format!(
            "weight length and stride arrays must match the input dimensionality ({dimension_count})"
        )));
    }
    Ok((0..dimension_count)
        .map(|i| {
            convolved_length(
                input_size.dimensions()[i],
                weight_lengths[i],
                padding[i],
                stride[i],
            )
        })
        .collect())
}
