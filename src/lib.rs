pub mod algebra;
mod activation;
mod cost;
mod error;
mod layers;
mod net;
mod training;

pub use activation::Activation;
pub use algebra::matrix::WeightInit;
pub use algebra::{Size, Tensor};
pub use cost::CostFunction;
pub use error::{NetError, Result};
pub use layers::{ActivationLayer, ConvolutionalLayer, DenseLayer, HasWeights, Layer};
pub use net::Net;
pub use training::{CancellationToken, TrainHandle, Trainer, TrainingRun};
