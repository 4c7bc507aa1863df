use crate::config::AgentConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use taskforce_core::{Task, TaskforceResult};

/// Result of one domain execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionOutput {
    /// Opaque result payload stored on the task record.
    pub output: serde_json::Value,
    /// Optional numeric value surfaced in reporting; never used for
    /// scheduling decisions.
    pub reported_value: Option<f64>,
}

impl ExecutionOutput {
    /// Wrap an opaque result payload.
    pub fn new(output: serde_json::Value) -> Self {
        Self {
            output,
            reported_value: None,
        }
    }

    /// Attach a reported value.
    pub fn with_value(mut self, value: f64) -> Self {
        self.reported_value = Some(value);
        self
    }
}

/// Domain-specific execution boundary, registered per agent kind.
///
/// The engine awaits `run` exactly once per assignment; a returned error
/// settles the task as failed and is recorded on the agent's performance,
/// never propagated into the dispatch loop.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Execute the task's domain logic. The agent's configuration is
    /// passed through so knobs like `risk_tolerance` reach the domain.
    async fn run(&self, task: &Task, config: &AgentConfig) -> TaskforceResult<ExecutionOutput>;
}
