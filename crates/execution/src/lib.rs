//! Execution layer - the periodic predict, gate and submit loop.

#![warn(missing_docs)]

pub mod predictor;
pub mod engine;

pub use predictor::{CommandPredictor, FixedPredictor, PredictError, Predictor};
pub use engine::{CycleResult, EngineConfig, SubmissionEngine};
