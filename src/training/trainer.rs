use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver};
use rayon::prelude::*;
use tracing::{debug, trace};

use crate::algebra::Tensor;
use crate::cost::CostFunction;
use crate::error::{NetError, Result};
use crate::net::Net;

use super::run::{missing, TrainingRun};

/// Cooperative cancellation flag, sampled by the trainer between epochs.
/// A batch already in flight always completes.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Drives gradient descent over a network: per-example backpropagation,
/// parallel batch combination and the epoch loop.
#[derive(Debug, Clone)]
pub struct Trainer {
    net: Arc<Net>,
    learning_rate: f32,
    cost_function: CostFunction,
}

impl Trainer {
    /// Creates a trainer with a quadratic cost.
    pub fn new(net: Arc<Net>, learning_rate: f32) -> Self {
        Trainer {
            net,
            learning_rate,
            cost_function: CostFunction::Quadratic,
        }
    }

    /// Replaces the cost function applied to the final layer's output.
    pub fn with_cost_function(mut self, cost_function: CostFunction) -> Self {
        self.cost_function = cost_function;
        self
    }

    pub fn net(&self) -> &Arc<Net> {
        &self.net
    }

    /// Runs one forward/backward pass for a single example and returns the
    /// populated run, without touching any weights.
    pub fn train_single(&self, input: &Tensor, target: &Tensor) -> Result<TrainingRun> {
        let mut run = self.net.feed_forwards_training(input.clone())?;

        let (cost, gradient) = {
            let output = run.output().ok_or_else(|| missing("output"))?;
            let cost = self
                .cost_function
                .cost(output.value(), target.value())?
                .sum();
            let gradient = self.cost_function.gradient(output.value(), target.value())?;
            (cost, Tensor::new(output.size().clone(), gradient)?)
        };

        run.set_cost(cost);
        run.set_output_error(gradient);
        self.net.back_propagate(&mut run)?;
        Ok(run)
    }

    /// Computes per-example gradients in parallel, reduces them with the
    /// order-insensitive [`TrainingRun::combine`] and applies the combined
    /// delta to the network once.
    pub fn train_batch(&self, batch: &[(Tensor, Tensor)]) -> Result<TrainingRun> {
        if batch.is_empty() {
            return Err(NetError::InvalidArgument(
                "cannot train on an empty batch".into(),
            ));
        }
        let layer_count = self.net.layers().len();

        let combined = batch
            .par_iter()
            .map(|(input, target)| self.train_single(input, target))
            .try_reduce(
                || TrainingRun::new(layer_count),
                |left, right| Ok(left.combine(right)),
            )?;

        self.net.apply_training(&combined, self.learning_rate);
        trace!(
            cost = combined.cost(),
            batch_size = combined.batch_size(),
            "applied combined batch deltas"
        );
        Ok(combined)
    }

    /// Trains on a background thread, streaming each epoch's average cost.
    ///
    /// The channel closes after `epoch_size` epochs, early without an error
    /// value when the token is cancelled, or with a terminal `Err` item when
    /// a batch fails; weight updates from earlier epochs are never rolled
    /// back.
    pub fn train(
        &self,
        epoch_size: usize,
        dataset: Vec<(Tensor, Tensor)>,
        token: CancellationToken,
    ) -> Receiver<Result<f32>> {
        let (sender, receiver) = unbounded();
        let trainer = self.clone();

        thread::spawn(move || {
            for epoch in 0..epoch_size {
                if token.is_cancelled() {
                    break;
                }

                let batch_run = match trainer.train_batch(&dataset) {
                    Ok(run) => run,
                    Err(error) => {
                        let _ = sender.send(Err(error));
                        return;
                    }
                };

                let average_cost = batch_run.cost() / batch_run.batch_size() as f32;
                debug!(epoch, average_cost, "epoch complete");
                if sender.send(Ok(average_cost)).is_err() {
                    break;
                }
            }
        });

        receiver
    }

    /// Convenience over [`Trainer::train`] that drains the stream internally
    /// and resolves with the last emitted cost, or the terminal error.
    pub fn train_async(
        &self,
        epoch_size: usize,
        dataset: Vec<(Tensor, Tensor)>,
        token: CancellationToken,
    ) -> TrainHandle {
        let receiver = self.train(epoch_size, dataset, token);
        let handle = thread::spawn(move || {
            let mut latest_cost = 0.0;
            for update in receiver {
                latest_cost = update?;
            }
            Ok(latest_cost)
        });
        TrainHandle { handle }
    }
}

/// Completion handle for a background training run.
#[derive(Debug)]
pub struct TrainHandle {
    handle: JoinHandle<Result<f32>>,
}

impl TrainHandle {
    /// Blocks until training completes and yields the final average cost.
    pub fn wait(self) -> Result<f32> {
        match self.handle.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}
