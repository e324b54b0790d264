//! Error types shared by the training, statistics and tuning layers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AcError {
    /// Invalid hyper-parameter or experiment setting, detected before any run starts
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A policy row sum or TD error that is zero or non-finite
    #[error("Numeric degeneracy in state {state}: got {value}")]
    NumericDegeneracy { state: usize, value: f64 },

    /// Unknown central-tendency or error-band name
    #[error("Unsupported {kind} '{value}'")]
    UnsupportedStatistic { kind: &'static str, value: String },

    /// The environment refused or failed a step
    #[error("Environment error: {0}")]
    Environment(String),

    /// Error raised inside one run of a batch
    #[error("Run {run} failed: {source}")]
    RunFailed {
        run: usize,
        #[source]
        source: Box<AcError>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl AcError {
    pub fn config(message: impl Into<String>) -> Self {
        AcError::Configuration(message.into())
    }

    pub fn environment(message: impl Into<String>) -> Self {
        AcError::Environment(message.into())
    }

    pub fn run_failed(run: usize, source: AcError) -> Self {
        AcError::RunFailed {
            run,
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, AcError>;
