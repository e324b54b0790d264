//! Statistics over learning curves: descriptive helpers, Welch's t-test and the
//! per-step batch comparator.

mod comparator;
mod curves;
pub mod descriptive;
mod welch;

pub use comparator::{
    CentralTendency, Comparator, ComparatorConfig, ComparisonResult, ErrorBand, StepComparison,
};
pub use curves::LearningCurveBatch;
pub use welch::{TTestResult, student_t_two_sided, welch_t_test};
