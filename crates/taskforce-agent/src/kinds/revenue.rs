use crate::agent::{Agent, AgentCore};
use crate::executor::{ExecutionOutput, TaskExecutor};
use async_trait::async_trait;
use std::sync::Arc;
use taskforce_core::{Task, TaskforceResult};
use tracing::debug;

/// Agent specialized in revenue-producing task types.
pub struct RevenueAgent {
    core: AgentCore,
    executor: Arc<dyn TaskExecutor>,
}

impl RevenueAgent {
    /// Build a revenue agent around an existing core (fresh or restored).
    pub fn with_core(core: AgentCore, executor: Arc<dyn TaskExecutor>) -> Self {
        Self { core, executor }
    }
}

#[async_trait]
impl Agent for RevenueAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    async fn execute(&self, task: &Task) -> TaskforceResult<ExecutionOutput> {
        let config = self.core.config();
        let output = self.executor.run(task, &config).await?;
        if let Some(value) = output.reported_value {
            debug!(agent = %self.core.id(), task = %task.id, value, "revenue reported");
        }
        Ok(output)
    }
}
