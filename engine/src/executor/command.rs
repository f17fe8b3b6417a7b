//! External-program task
//!
//! Runs an overlap program once per pair and reads the kernel value from its
//! standard output. The program receives the two item identifiers through an
//! argument template: `{a}` and `{b}` are substituted, and if neither appears
//! the identifiers are appended as the last two arguments.

use super::types::{ComputationError, ComputationResult};
use super::PairwiseTask;
use crate::discovery::Item;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Longest stderr excerpt kept in a failure message
const MAX_STDERR_EXCERPT: usize = 512;

/// Pairwise task backed by an external executable
#[derive(Debug, Clone)]
pub struct CommandTask {
    program: String,
    args: Vec<String>,
}

impl CommandTask {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Build the argument list for one pair
    fn render_args(&self, a: &Item, b: &Item) -> Vec<String> {
        let templated = self
            .args
            .iter()
            .any(|arg| arg.contains("{a}") || arg.contains("{b}"));

        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|arg| arg.replace("{a}", a.as_str()).replace("{b}", b.as_str()))
            .collect();

        if !templated {
            args.push(a.to_string());
            args.push(b.to_string());
        }
        args
    }
}

/// Parse a kernel value from program output
fn parse_value(stdout: &[u8]) -> ComputationResult<f64> {
    let text = String::from_utf8_lossy(stdout);
    let trimmed = text.trim();

    let value: f64 = trimmed
        .parse()
        .map_err(|_| ComputationError::InvalidOutput(format!("not a number: {:?}", trimmed)))?;

    if !value.is_finite() {
        return Err(ComputationError::InvalidOutput(format!(
            "non-finite value: {}",
            value
        )));
    }
    Ok(value)
}

#[async_trait]
impl PairwiseTask for CommandTask {
    #[instrument(level = "debug", skip(self), fields(program = %self.program))]
    async fn compute(&self, a: &Item, b: &Item) -> ComputationResult<f64> {
        let args = self.render_args(a, b);

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let excerpt: String = stderr.trim().chars().take(MAX_STDERR_EXCERPT).collect();
            return Err(ComputationError::Failed(format!(
                "{} exited with {}: {}",
                self.program, output.status, excerpt
            )));
        }

        let value = parse_value(&output.stdout)?;
        debug!(value = value, "Overlap computed");
        Ok(value)
    }

    fn name(&self) -> &str {
        &self.program
    }
}
