use serde::{Deserialize, Serialize};
use taskforce_core::AgentId;
use uuid::Uuid;

/// Specialization of a worker agent.
///
/// The engine treats kinds opaquely; they matter for default capability
/// sets, executor registration, and pool distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    /// Produces revenue-generating work items.
    Revenue,
    /// Watches markets and produces analysis.
    Market,
    /// Tunes parameters of already-running processes.
    Optimization,
    /// Assesses risk exposure of proposed actions.
    Risk,
}

impl AgentKind {
    /// All kinds, in a stable order.
    pub const ALL: [AgentKind; 4] = [
        AgentKind::Revenue,
        AgentKind::Market,
        AgentKind::Optimization,
        AgentKind::Risk,
    ];

    /// Task-type tags an agent of this kind serves by default.
    pub fn default_capabilities(self) -> Vec<String> {
        let tags: &[&str] = match self {
            AgentKind::Revenue => &["revenue_generation", "payment_processing"],
            AgentKind::Market => &["market_analysis", "trend_detection"],
            AgentKind::Optimization => &["optimization", "revenue_generation"],
            AgentKind::Risk => &["risk_assessment"],
        };
        tags.iter().map(|t| (*t).to_string()).collect()
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentKind::Revenue => write!(f, "revenue"),
            AgentKind::Market => write!(f, "market"),
            AgentKind::Optimization => write!(f, "optimization"),
            AgentKind::Risk => write!(f, "risk"),
        }
    }
}

/// Static configuration of a single agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Unique agent identifier.
    pub id: AgentId,
    /// Worker specialization.
    pub kind: AgentKind,
    /// Human-readable name, e.g. `revenue-3`.
    pub name: String,
    /// Task-type tags this agent serves.
    pub capabilities: Vec<String>,
    /// Concurrency ceiling; the agent holds at most this many assignments.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_tasks: usize,
    /// Tie-break weight used by the dispatcher when scores are equal.
    #[serde(default)]
    pub priority: u32,
    /// Domain knob passed through to executors; the scheduler never reads it.
    #[serde(default = "default_risk_tolerance")]
    pub risk_tolerance: f64,
    /// Minimum acceptable success rate before retirement consideration.
    #[serde(default = "default_performance_threshold")]
    pub performance_threshold: f64,
}

fn default_max_concurrent() -> usize {
    2
}

fn default_risk_tolerance() -> f64 {
    0.5
}

fn default_performance_threshold() -> f64 {
    0.7
}

impl AgentConfig {
    /// Default configuration for an agent of the given kind.
    pub fn for_kind(kind: AgentKind, name: impl Into<String>) -> Self {
        let (max_concurrent_tasks, priority, risk_tolerance) = match kind {
            AgentKind::Revenue => (3, 2, 0.6),
            AgentKind::Market => (2, 1, 0.4),
            AgentKind::Optimization => (2, 1, 0.5),
            AgentKind::Risk => (1, 1, 0.2),
        };
        Self {
            id: Uuid::new_v4(),
            kind,
            name: name.into(),
            capabilities: kind.default_capabilities(),
            max_concurrent_tasks,
            priority,
            risk_tolerance,
            performance_threshold: default_performance_threshold(),
        }
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, update: AgentConfigUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(capabilities) = update.capabilities {
            self.capabilities = capabilities;
        }
        if let Some(max) = update.max_concurrent_tasks {
            self.max_concurrent_tasks = max;
        }
        if let Some(priority) = update.priority {
            self.priority = priority;
        }
        if let Some(risk) = update.risk_tolerance {
            self.risk_tolerance = risk;
        }
        if let Some(threshold) = update.performance_threshold {
            self.performance_threshold = threshold;
        }
    }
}

/// Partial update for [`AgentConfig`]; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfigUpdate {
    /// New name.
    pub name: Option<String>,
    /// Replacement capability set.
    pub capabilities: Option<Vec<String>>,
    /// New concurrency ceiling.
    pub max_concurrent_tasks: Option<usize>,
    /// New tie-break weight.
    pub priority: Option<u32>,
    /// New risk knob.
    pub risk_tolerance: Option<f64>,
    /// New retirement threshold.
    pub performance_threshold: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_display() {
        assert_eq!(AgentKind::Revenue.to_string(), "revenue");
        assert_eq!(AgentKind::Risk.to_string(), "risk");
    }

    #[test]
    fn test_kind_serde_lowercase() {
        let json = serde_json::to_string(&AgentKind::Market).unwrap();
        assert_eq!(json, "\"market\"");
    }

    #[test]
    fn test_for_kind_defaults() {
        let config = AgentConfig::for_kind(AgentKind::Revenue, "revenue-0");
        assert_eq!(config.kind, AgentKind::Revenue);
        assert_eq!(config.max_concurrent_tasks, 3);
        assert!(config
            .capabilities
            .contains(&"revenue_generation".to_string()));
    }

    #[test]
    fn test_apply_partial_update() {
        let mut config = AgentConfig::for_kind(AgentKind::Market, "market-0");
        config.apply(AgentConfigUpdate {
            max_concurrent_tasks: Some(7),
            risk_tolerance: Some(0.9),
            ..AgentConfigUpdate::default()
        });
        assert_eq!(config.max_concurrent_tasks, 7);
        assert_eq!(config.risk_tolerance, 0.9);
        // untouched fields keep their defaults
        assert_eq!(config.name, "market-0");
        assert_eq!(config.priority, 1);
    }
}
