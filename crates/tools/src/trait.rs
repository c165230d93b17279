//! Tool abstraction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Errors from running a tool.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// The executable does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// The tool did not finish in time
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Any other spawn or pipe failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A tool that can be executed.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get tool name.
    fn name(&self) -> &str;

    /// Execute the tool.
    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput, ToolError>;

    /// Whether the tool can be run at all.
    async fn is_available(&self, timeout: Duration) -> bool;
}

/// Input to a tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolInput {
    /// Command arguments
    pub args: Vec<String>,

    /// Environment variables
    pub env: HashMap<String, String>,

    /// Standard input
    pub stdin: Option<String>,

    /// Timeout
    pub timeout: Option<Duration>,
}

impl ToolInput {
    /// Input with the given arguments and timeout.
    pub fn new<I, S>(args: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            env: HashMap::new(),
            stdin: None,
            timeout: Some(timeout),
        }
    }

    /// Append arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Feed text on standard input.
    pub fn stdin(mut self, text: impl Into<String>) -> Self {
        self.stdin = Some(text.into());
        self
    }
}

/// Output from a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Exit code
    pub exit_code: i32,

    /// Standard output
    pub stdout: String,

    /// Standard error
    pub stderr: String,

    /// Execution duration
    pub duration: Duration,
}

impl ToolOutput {
    /// Exit code was zero.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}
