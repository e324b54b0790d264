pub mod config;
pub mod env;
pub mod error;
pub mod infra;
pub mod report;
pub mod rl;
pub mod state;
pub mod stats;
pub mod tuning;

// Re-export commonly used types for convenience
pub use config::ExperimentConfig;
pub use env::{Environment, MazeConfig, MazeEnv};
pub use error::{AcError, Result};
pub use rl::{BatchResult, ExperimentRunner, HyperParams, PolicyTable, TrainingConfig, ValueTable};
pub use stats::{Comparator, ComparatorConfig, ComparisonResult, LearningCurveBatch};
