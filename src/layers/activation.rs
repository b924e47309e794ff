use crate::activation::Activation;
use crate::algebra::{Size, Tensor};
use crate::error::Result;
use crate::training::run::missing;
use crate::training::TrainingRun;

/// Stateless elementwise activation layer; input and output share one size.
#[derive(Debug, Clone)]
pub struct ActivationLayer {
    size: Size,
    kind: Activation,
}

impl ActivationLayer {
    pub fn new(size: Size, kind: Activation) -> Self {
        ActivationLayer { size, kind }
    }

    pub fn kind(&self) -> Activation {
        self.kind
    }

    pub fn input_size(&self) -> &Size {
        &self.size
    }

    pub fn output_size(&self) -> &Size {
        &self.size
    }

    pub(crate) fn feed_forwards(&self, input: &Tensor) -> Tensor {
        input.map(|x| self.kind.apply(x))
    }

    pub(crate) fn back_propagate(&self, run: &mut TrainingRun) -> Result<()> {
        let derivative = run
            .input()
            .ok_or_else(|| missing("input"))?
            .map(|x| self.kind.derivative(x));
        let output_error = run.output_error().ok_or_else(|| missing("output error"))?;

        let input_error = Tensor::new(
            self.size.clone(),
            output_error.value() * derivative.value(),
        )?;
        run.set_input_error(input_error);
        Ok(())
    }
}
