pub mod activation;
pub mod convolutional;
pub mod dense;

use ndarray::Array2;

use crate::algebra::{Size, Tensor};
use crate::error::{NetError, Result};
use crate::training::TrainingRun;

pub use activation::ActivationLayer;
pub use convolutional::ConvolutionalLayer;
pub use dense::DenseLayer;

/// Synchronized access to a weighted layer's parameter matrix.
///
/// The training loop and external inspection code may call these
/// concurrently; every implementation guards its matrix with a lock.
pub trait HasWeights {
    /// Snapshot of the current weights.
    fn get_weights(&self) -> Array2<f32>;

    /// Replaces the weights wholesale.
    fn set_weights(&self, weights: Array2<f32>);

    /// Read-modify-write under the layer's lock.
    fn update_weights(&self, update: &mut dyn FnMut(Array2<f32>) -> Array2<f32>);
}

/// The closed set of layer variants, dispatched through one contract.
///
/// Input and output sizes are fixed at construction; weighted variants own
/// their parameter matrix and are mutated only through [`HasWeights`].
#[derive(Debug)]
pub enum Layer {
    Dense(DenseLayer),
    Convolutional(ConvolutionalLayer),
    Activation(ActivationLayer),
}

impl Layer {
    pub fn input_size(&self) -> &Size {
        match self {
            Layer::Dense(layer) => layer.input_size(),
            Layer::Convolutional(layer) => layer.input_size(),
            Layer::Activation(layer) => layer.input_size(),
        }
    }

    pub fn output_size(&self) -> &Size {
        match self {
            Layer::Dense(layer) => layer.output_size(),
            Layer::Convolutional(layer) => layer.output_size(),
            Layer::Activation(layer) => layer.output_size(),
        }
    }

    /// Runs the layer forwards, checking the input against the declared
    /// input size and the computed output against the declared output size.
    pub fn feed_forwards(&self, input: &Tensor) -> Result<Tensor> {
        if input.size() != self.input_size() {
            return Err(NetError::ShapeMismatch(format!(
                "input tensor size {} differs from the layer's declared input {}",
                input.size(),
                self.input_size()
            )));
        }

        let output = match self {
            Layer::Dense(layer) => layer.feed_forwards(input)?,
            Layer::Convolutional(layer) => layer.feed_forwards(input)?,
            Layer::Activation(layer) => layer.feed_forwards(input),
        };

        if output.size() != self.output_size() {
            return Err(NetError::ShapeMismatch(format!(
                "output tensor size {} differs from the layer's declared output {}",
                output.size(),
                self.output_size()
            )));
        }
        Ok(output)
    }

    /// Reads the run's current input and output error and writes the input
    /// error plus, for weighted layers, the weights delta.
    pub fn back_propagate(&self, run: &mut TrainingRun) -> Result<()> {
        match self {
            Layer::Dense(layer) => layer.back_propagate(run),
            Layer::Convolutional(layer) => layer.back_propagate(run),
            Layer::Activation(layer) => layer.back_propagate(run),
        }
    }

    /// The weighted view of this layer, if it owns weights.
    pub fn weights(&self) -> Option<&dyn HasWeights> {
        match self {
            Layer::Dense(layer) => Some(layer),
            Layer::Convolutional(layer) => Some(layer),
            Layer::Activation(_) => None,
        }
    }
}
