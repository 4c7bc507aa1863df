use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use taskforce_agent::AgentKind;

/// Rule used to pick which available, capable agent receives the next
/// dispatched task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancingStrategy {
    /// Rotate deterministically through the candidate list; ignores
    /// performance.
    #[default]
    RoundRobin,
    /// Highest efficiency wins; ties broken by lowest assigned count.
    PerformanceBased,
    /// Most completions among capable candidates wins (experience-weighted).
    TaskAffinity,
}

/// Configuration for a workforce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkforceConfig {
    /// Hard cap on pool size.
    #[serde(default = "default_max_agents")]
    pub max_agents: usize,
    /// Scale-down floor; never reached zero while auto-scaling runs.
    #[serde(default = "default_min_agents")]
    pub min_agents: usize,
    /// Ordered list of kinds the initial distribution cycles through.
    #[serde(default = "default_agent_kinds")]
    pub agent_kinds: Vec<AgentKind>,
    /// Agents spawned on a cold start.
    #[serde(default = "default_initial_agents")]
    pub initial_agents: usize,
    /// Hard cap on queued tasks.
    #[serde(default = "default_queue_size")]
    pub task_queue_size: usize,
    /// Success rate below which agents enter the warning band.
    #[serde(default = "default_performance_threshold")]
    pub performance_threshold: f64,
    /// Whether the auto-scaler adjusts the pool.
    #[serde(default = "default_true")]
    pub auto_scaling: bool,
    /// Agent selection rule.
    #[serde(default)]
    pub load_balancing: LoadBalancingStrategy,
    /// Period of the dispatch loop.
    #[serde(default = "default_dispatch_interval")]
    pub dispatch_interval_ms: u64,
    /// Period of the auto-scale loop; slower than dispatch.
    #[serde(default = "default_scale_interval")]
    pub scale_interval_ms: u64,
    /// Period of the health-check loop.
    #[serde(default = "default_health_interval")]
    pub health_interval_ms: u64,
    /// Dispatch cycles without a capable agent before a task is
    /// dead-lettered as failed.
    #[serde(default = "default_max_dispatch_attempts")]
    pub max_dispatch_attempts: u32,
    /// Upper bound on how long `stop()` waits for in-flight executions.
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_ms: u64,
    /// Terminal tasks retained for `task_status` lookups.
    #[serde(default = "default_history")]
    pub finished_history_size: usize,
}

fn default_max_agents() -> usize {
    10
}
fn default_min_agents() -> usize {
    1
}
fn default_agent_kinds() -> Vec<AgentKind> {
    vec![AgentKind::Revenue, AgentKind::Market]
}
fn default_initial_agents() -> usize {
    4
}
fn default_queue_size() -> usize {
    100
}
fn default_performance_threshold() -> f64 {
    0.7
}
fn default_true() -> bool {
    true
}
fn default_dispatch_interval() -> u64 {
    200
}
fn default_scale_interval() -> u64 {
    5_000
}
fn default_health_interval() -> u64 {
    10_000
}
fn default_max_dispatch_attempts() -> u32 {
    100
}
fn default_drain_timeout() -> u64 {
    10_000
}
fn default_history() -> usize {
    1_000
}

impl Default for WorkforceConfig {
    fn default() -> Self {
        Self {
            max_agents: default_max_agents(),
            min_agents: default_min_agents(),
            agent_kinds: default_agent_kinds(),
            initial_agents: default_initial_agents(),
            task_queue_size: default_queue_size(),
            performance_threshold: default_performance_threshold(),
            auto_scaling: true,
            load_balancing: LoadBalancingStrategy::default(),
            dispatch_interval_ms: default_dispatch_interval(),
            scale_interval_ms: default_scale_interval(),
            health_interval_ms: default_health_interval(),
            max_dispatch_attempts: default_max_dispatch_attempts(),
            drain_timeout_ms: default_drain_timeout(),
            finished_history_size: default_history(),
        }
    }
}

/// Point-in-time view of the workforce, recomputed on demand and never
/// persisted as a source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkforceMetrics {
    /// Live (non-retired) agents in the pool.
    pub total_agents: usize,
    /// Agents currently holding at least one assignment.
    pub active_agents: usize,
    /// Agents with no assignments.
    pub idle_agents: usize,
    /// Tasks waiting in the queue.
    pub queue_length: usize,
    /// Tasks that reached a terminal status through execution.
    pub total_tasks_processed: u64,
    /// Mean wall-clock execution time over all settled tasks.
    pub average_completion_ms: f64,
    /// Mean efficiency score over live agents.
    pub overall_efficiency: f64,
    /// active_agents / total_agents; 0.0 with an empty pool.
    pub system_load: f64,
    /// Live agents per kind; values sum to `total_agents`.
    pub agent_kind_distribution: HashMap<String, usize>,
    /// Queued tasks that have been passed over by several dispatch cycles.
    pub starving_tasks: usize,
    /// Highest dispatch-attempt count among queued tasks.
    pub max_dispatch_attempts: u32,
    /// Age of the oldest queued task.
    pub oldest_queued_ms: u64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkforceConfig::default();
        assert_eq!(config.max_agents, 10);
        assert_eq!(config.task_queue_size, 100);
        assert!(config.auto_scaling);
        assert_eq!(config.load_balancing, LoadBalancingStrategy::RoundRobin);
        assert!(config.min_agents >= 1);
    }

    #[test]
    fn test_strategy_serde() {
        let json = serde_json::to_string(&LoadBalancingStrategy::PerformanceBased).unwrap();
        assert_eq!(json, "\"performance_based\"");
        let parsed: LoadBalancingStrategy = serde_json::from_str("\"task_affinity\"").unwrap();
        assert_eq!(parsed, LoadBalancingStrategy::TaskAffinity);
    }

    #[test]
    fn test_partial_config_from_json() {
        // everything not given falls back to a default
        let config: WorkforceConfig = serde_json::from_str(
            r#"{"max_agents": 6, "load_balancing": "performance_based", "auto_scaling": false}"#,
        )
        .unwrap();
        assert_eq!(config.max_agents, 6);
        assert!(!config.auto_scaling);
        assert_eq!(
            config.load_balancing,
            LoadBalancingStrategy::PerformanceBased
        );
        assert_eq!(config.initial_agents, 4);
    }
}
