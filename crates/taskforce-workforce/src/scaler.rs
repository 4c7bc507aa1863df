use std::collections::HashMap;
use taskforce_agent::AgentKind;

/// System load above which the pool grows.
const LOAD_SCALE_UP: f64 = 0.8;
/// System load below which the pool may shrink.
const LOAD_SCALE_DOWN: f64 = 0.3;
/// Queue fill ratio above which the pool grows.
const QUEUE_SCALE_UP: f64 = 0.7;
/// Queue fill ratio below which the pool may shrink.
const QUEUE_SCALE_DOWN: f64 = 0.2;
/// Agents added per scale-up step.
const SCALE_UP_STEP: usize = 2;
/// Agents retired per scale-down step.
const SCALE_DOWN_STEP: usize = 1;

/// Inputs to one scaling evaluation.
#[derive(Debug, Clone)]
pub struct ScalingContext {
    /// Live (non-retired) agents.
    pub total_agents: usize,
    /// Agents holding at least one assignment.
    pub active_agents: usize,
    /// Tasks waiting in the queue.
    pub queue_length: usize,
    /// Hard queue capacity.
    pub queue_capacity: usize,
    /// Scale-down floor.
    pub min_agents: usize,
    /// Scale-up cap.
    pub max_agents: usize,
    /// Queued task-type tags and their counts (the demand signal).
    pub queued_types: HashMap<String, usize>,
    /// Live agents per kind.
    pub kind_distribution: HashMap<AgentKind, usize>,
}

impl ScalingContext {
    /// active / total; 0.0 with an empty pool.
    pub fn system_load(&self) -> f64 {
        if self.total_agents == 0 {
            0.0
        } else {
            self.active_agents as f64 / self.total_agents as f64
        }
    }

    /// queued / capacity; 0.0 with a zero-capacity queue.
    pub fn queue_pressure(&self) -> f64 {
        if self.queue_capacity == 0 {
            0.0
        } else {
            self.queue_length as f64 / self.queue_capacity as f64
        }
    }
}

/// Decision produced by one scaling evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalingDecision {
    /// No action needed.
    None,
    /// Grow the pool.
    ScaleUp {
        /// Kinds to spawn, one entry per new agent.
        kinds: Vec<AgentKind>,
        /// Why the pool grows.
        reason: String,
    },
    /// Shrink the pool.
    ScaleDown {
        /// Agents to retire.
        count: usize,
        /// Over-represented kind to retire from, when one exists.
        kind: Option<AgentKind>,
        /// Why the pool shrinks.
        reason: String,
    },
}

/// Grows and shrinks the agent pool from observed load and queue depth.
///
/// `evaluate` is pure; the workforce manager applies the decision.
pub struct AutoScaler {
    enabled: bool,
    agent_kinds: Vec<AgentKind>,
}

impl AutoScaler {
    /// Scaler cycling over the given kinds when spawning.
    pub fn new(enabled: bool, agent_kinds: Vec<AgentKind>) -> Self {
        Self {
            enabled,
            agent_kinds,
        }
    }

    /// Evaluate the context and decide.
    pub fn evaluate(&self, context: &ScalingContext) -> ScalingDecision {
        if !self.enabled || self.agent_kinds.is_empty() {
            return ScalingDecision::None;
        }
        let load = context.system_load();
        let pressure = context.queue_pressure();

        if (load > LOAD_SCALE_UP || pressure > QUEUE_SCALE_UP)
            && context.total_agents < context.max_agents
        {
            let count = SCALE_UP_STEP.min(context.max_agents - context.total_agents);
            return ScalingDecision::ScaleUp {
                kinds: self.spawn_kinds(context, count),
                reason: format!("system load {load:.2}, queue pressure {pressure:.2}"),
            };
        }

        if load < LOAD_SCALE_DOWN
            && pressure < QUEUE_SCALE_DOWN
            && context.total_agents > context.min_agents
        {
            let count = SCALE_DOWN_STEP.min(context.total_agents - context.min_agents);
            return ScalingDecision::ScaleDown {
                count,
                kind: Self::over_represented(context),
                reason: format!("system load {load:.2}, queue pressure {pressure:.2}"),
            };
        }

        ScalingDecision::None
    }

    /// Kinds for the new agents: when queued work signals demand for a
    /// specific kind, spawn that kind; otherwise follow the current
    /// distribution (largest shares first) so proportions are preserved.
    fn spawn_kinds(&self, context: &ScalingContext, count: usize) -> Vec<AgentKind> {
        if let Some(kind) = self.demanded_kind(context) {
            return vec![kind; count];
        }
        let mut by_share: Vec<AgentKind> = self.agent_kinds.clone();
        by_share.sort_by_key(|kind| {
            std::cmp::Reverse(context.kind_distribution.get(kind).copied().unwrap_or(0))
        });
        (0..count).map(|i| by_share[i % by_share.len()]).collect()
    }

    /// The kind whose default capabilities cover the most queued work,
    /// when any queued task type is covered at all.
    fn demanded_kind(&self, context: &ScalingContext) -> Option<AgentKind> {
        self.agent_kinds
            .iter()
            .copied()
            .map(|kind| {
                let covered: usize = kind
                    .default_capabilities()
                    .iter()
                    .filter_map(|capability| context.queued_types.get(capability))
                    .sum();
                (kind, covered)
            })
            .filter(|(_, covered)| *covered > 0)
            .max_by_key(|(_, covered)| *covered)
            .map(|(kind, _)| kind)
    }

    /// Kind with the largest live population.
    fn over_represented(context: &ScalingContext) -> Option<AgentKind> {
        context
            .kind_distribution
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(kind, _)| *kind)
    }
}
