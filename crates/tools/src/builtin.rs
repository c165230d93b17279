//! Subprocess tool.

use super::r#trait::*;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Default ceiling when an input carries no timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Runs one external executable.
#[derive(Debug, Clone)]
pub struct CommandTool {
    program: String,
}

impl CommandTool {
    /// Wrap an executable name or path.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl Tool for CommandTool {
    fn name(&self) -> &str {
        &self.program
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let timeout = input.timeout.unwrap_or(DEFAULT_TIMEOUT);

        let mut cmd = Command::new(&self.program);
        cmd.args(&input.args)
            .stdin(if input.stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for (k, v) in &input.env {
            cmd.env(k, v);
        }

        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ToolError::NotFound(self.program.clone()),
            _ => ToolError::Io(e),
        })?;

        tracing::debug!("Running {} {:?}", self.program, input.args);

        // Stdin is fed while output is collected; both count against the
        // timeout. The pipe closes when the feed finishes.
        let pipe = child.stdin.take();
        let feed = async move {
            if let (Some(mut pipe), Some(text)) = (pipe, input.stdin.as_deref()) {
                pipe.write_all(text.as_bytes()).await?;
            }
            Ok::<(), std::io::Error>(())
        };
        let run = async move {
            let (fed, output) = tokio::join!(feed, child.wait_with_output());
            fed?;
            output
        };

        // The child is killed on drop when the timeout fires.
        let output = match tokio::time::timeout(timeout, run).await {
            Ok(output) => output?,
            Err(_) => return Err(ToolError::Timeout(timeout)),
        };

        Ok(ToolOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration: start.elapsed(),
        })
    }

    async fn is_available(&self, timeout: Duration) -> bool {
        let input = ToolInput::new(["version"], timeout);
        match self.execute(&input).await {
            Ok(_) => true,
            Err(ToolError::NotFound(_)) => false,
            Err(e) => {
                tracing::warn!("Probe of {} failed: {}", self.program, e);
                false
            }
        }
    }
}
