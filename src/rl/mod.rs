//! Tabular actor-critic learning
//!
//! ```text
//! ExperimentRunner            one run = fresh tables, N episodes
//!     │
//!     ▼
//! EpisodeRunner               sample pi(.|x), epsilon relabel, env.step
//!     │
//!     ▼
//! actor_critic::update        TD error, critic step, clamped actor step + renormalise
//!     │
//!     ▼
//! ValueTable / PolicyTable    mutated in place, owned by the run
//! ```

pub mod actor_critic;
pub mod episode;
pub mod experiment;
pub mod metrics;
pub mod tables;

pub use actor_critic::{HyperParams, Transition, update};
pub use episode::{EpisodeRecord, EpisodeRunner, EpisodeStatus};
pub use experiment::{BatchResult, ExperimentRunner, RunResult, TrainingConfig, run_seed};
pub use metrics::{MovingAverage, RunStatistics, TrainingMetrics};
pub use tables::{MIN_PROBABILITY, PolicyInit, PolicyTable, ValueTable};
