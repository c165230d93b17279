//! Prediction boundary.
//!
//! The engine does not train or run models. It asks a [`Predictor`] for one
//! number per cycle.

use async_trait::async_trait;
use epochgate_core::TopicId;
use epochgate_schedule::WindowSet;
use epochgate_tools::{Tool, ToolError, ToolInput};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Prediction failures.
#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    /// Command could not be run
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// Command exited non-zero
    #[error("predictor exited with code {code}: {stderr}")]
    Exit {
        /// Exit code
        code: i32,
        /// Trimmed standard error
        stderr: String,
    },

    /// Output was not a finite number
    #[error("predictor output is not a number: {0:?}")]
    Parse(String),
}

/// Produces the value to submit for a cycle.
#[async_trait]
pub trait Predictor: Send + Sync {
    /// Predict for `topic_id` over the given windows.
    async fn predict(&self, topic_id: TopicId, windows: &WindowSet) -> Result<f64, PredictError>;
}

/// Always returns the same value.
#[derive(Debug, Clone, Copy)]
pub struct FixedPredictor(pub f64);

#[async_trait]
impl Predictor for FixedPredictor {
    async fn predict(&self, _topic_id: TopicId, _windows: &WindowSet) -> Result<f64, PredictError> {
        Ok(self.0)
    }
}

/// Runs an external command and reads the prediction from its output.
///
/// The window boundaries are appended as `--topic-id`, `--train-start`,
/// `--train-end`, `--validation-start`, `--validation-end`, `--test-start`,
/// `--test-end` and `--inference-time` (RFC 3339). The last non-empty
/// stdout line must parse as a finite `f64`.
pub struct CommandPredictor {
    tool: Arc<dyn Tool>,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandPredictor {
    /// Create a predictor running `tool` with leading `args`.
    pub fn new(tool: Arc<dyn Tool>, args: Vec<String>, timeout: Duration) -> Self {
        Self { tool, args, timeout }
    }

    fn window_args(topic_id: TopicId, windows: &WindowSet) -> Vec<String> {
        let pairs = [
            ("--train-start", windows.train_start),
            ("--train-end", windows.train_end),
            ("--validation-start", windows.validation_start),
            ("--validation-end", windows.validation_end),
            ("--test-start", windows.test_start),
            ("--test-end", windows.test_end),
            ("--inference-time", windows.inference_time),
        ];
        let mut args = vec!["--topic-id".to_string(), topic_id.to_string()];
        for (flag, time) in pairs {
            args.push(flag.to_string());
            args.push(time.to_rfc3339_opts(chrono::SecondsFormat::Secs, true));
        }
        args
    }
}

#[async_trait]
impl Predictor for CommandPredictor {
    async fn predict(&self, topic_id: TopicId, windows: &WindowSet) -> Result<f64, PredictError> {
        let input = ToolInput::new(self.args.clone(), self.timeout).args(Self::window_args(topic_id, windows));
        let output = self.tool.execute(&input).await?;

        if !output.success() {
            return Err(PredictError::Exit {
                code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }

        let line = output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .last()
            .unwrap_or_default();

        debug!("Predictor output: {}", line);

        match line.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(PredictError::Parse(line.to_string())),
        }
    }
}
