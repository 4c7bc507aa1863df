use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use taskforce_agent::{Agent, AgentConfig};
use taskforce_core::{TaskforceError, TaskforceResult};

/// Persisted snapshot of one agent: configuration plus lifetime counters.
/// The execution-time window is not persisted; it repopulates after a
/// restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    /// The agent's configuration at save time.
    pub config: AgentConfig,
    /// Lifetime successful settlements.
    #[serde(default)]
    pub tasks_completed: u64,
    /// Lifetime failed settlements.
    #[serde(default)]
    pub tasks_failed: u64,
    /// Lifetime sum of reported values.
    #[serde(default)]
    pub total_reported_value: f64,
}

impl AgentRecord {
    /// Snapshot a live agent.
    pub fn from_agent(agent: &Arc<dyn Agent>) -> Self {
        let performance = agent.performance();
        Self {
            config: agent.config(),
            tasks_completed: performance.tasks_completed,
            tasks_failed: performance.tasks_failed,
            total_reported_value: performance.total_reported_value,
        }
    }
}

/// Narrow persistence interface for workforce state.
///
/// The engine must function correctly without it: any load failure means
/// a cold start with freshly spawned agents.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Persist the current agent set.
    async fn save(&self, agents: &[AgentRecord]) -> TaskforceResult<()>;
    /// Load the previously persisted agent set. An empty result means
    /// nothing was persisted.
    async fn load(&self) -> TaskforceResult<Vec<AgentRecord>>;
}

/// JSON-file-backed store. Good enough for single-node restarts.
pub struct JsonFileStateStore {
    path: PathBuf,
}

impl JsonFileStateStore {
    /// Store writing to the given file path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl StateStore for JsonFileStateStore {
    async fn save(&self, agents: &[AgentRecord]) -> TaskforceResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(agents)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }

    async fn load(&self) -> TaskforceResult<Vec<AgentRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let data = tokio::fs::read_to_string(&self.path).await?;
        serde_json::from_str(&data)
            .map_err(|e| TaskforceError::State(format!("failed to parse state file: {e}")))
    }
}
