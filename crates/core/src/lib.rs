pub mod catalog;
pub mod config;
pub mod error;
pub mod experimentation;
pub mod types;
pub mod winner;

pub use catalog::{Video, VideoCatalog};
pub use config::AppConfig;
pub use error::{CoreError, CoreResult};
pub use experimentation::{Completion, NewExperiment, MAX_VARIANTS, MIN_VARIANTS};
pub use types::{Experiment, ExperimentOutcome, ExperimentStatus, PublishInstruction, Variant};
pub use winner::Leader;
