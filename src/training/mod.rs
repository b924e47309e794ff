pub mod run;
pub mod trainer;

pub use run::TrainingRun;
pub use trainer::{CancellationToken, TrainHandle, Trainer};
