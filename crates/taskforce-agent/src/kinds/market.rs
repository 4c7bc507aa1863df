use crate::agent::{Agent, AgentCore};
use crate::executor::{ExecutionOutput, TaskExecutor};
use async_trait::async_trait;
use std::sync::Arc;
use taskforce_core::{Task, TaskforceResult};

/// Agent specialized in market-observation task types.
pub struct MarketAgent {
    core: AgentCore,
    executor: Arc<dyn TaskExecutor>,
}

impl MarketAgent {
    /// Build a market agent around an existing core (fresh or restored).
    pub fn with_core(core: AgentCore, executor: Arc<dyn TaskExecutor>) -> Self {
        Self { core, executor }
    }
}

#[async_trait]
impl Agent for MarketAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    async fn execute(&self, task: &Task) -> TaskforceResult<ExecutionOutput> {
        let config = self.core.config();
        self.executor.run(task, &config).await
    }
}
