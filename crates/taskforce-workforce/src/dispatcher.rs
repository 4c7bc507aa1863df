use crate::types::LoadBalancingStrategy;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use taskforce_agent::Agent;
use taskforce_core::Task;

/// Matches queued tasks to available, capable agents using the configured
/// selection strategy.
pub struct Dispatcher {
    strategy: LoadBalancingStrategy,
    rotation: AtomicUsize,
}

impl Dispatcher {
    /// Dispatcher using the given strategy.
    pub fn new(strategy: LoadBalancingStrategy) -> Self {
        Self {
            strategy,
            rotation: AtomicUsize::new(0),
        }
    }

    /// The configured strategy.
    pub fn strategy(&self) -> LoadBalancingStrategy {
        self.strategy
    }

    /// Pick an agent for the task, or `None` when no capable agent is
    /// currently available (back-pressure; the task is requeued).
    pub fn select(&self, task: &Task, agents: &[Arc<dyn Agent>]) -> Option<Arc<dyn Agent>> {
        let candidates: Vec<&Arc<dyn Agent>> = agents
            .iter()
            .filter(|agent| agent.can_handle(task) && agent.is_available())
            .collect();
        if candidates.is_empty() {
            return None;
        }
        let chosen = match self.strategy {
            LoadBalancingStrategy::RoundRobin => {
                let index = self.rotation.fetch_add(1, Ordering::Relaxed) % candidates.len();
                candidates[index]
            }
            LoadBalancingStrategy::PerformanceBased => {
                Self::best_by(&candidates, |agent| agent.performance().efficiency)
            }
            LoadBalancingStrategy::TaskAffinity => Self::best_by(&candidates, |agent| {
                agent.performance().tasks_completed as f64
            }),
        };
        Some(Arc::clone(chosen))
    }

    /// Highest score wins; ties broken by lowest assigned count, then by
    /// the agent's configured priority weight.
    fn best_by<'a>(
        candidates: &[&'a Arc<dyn Agent>],
        score: impl Fn(&Arc<dyn Agent>) -> f64,
    ) -> &'a Arc<dyn Agent> {
        let mut best = candidates[0];
        let mut best_score = score(best);
        for &candidate in &candidates[1..] {
            let candidate_score = score(candidate);
            let ordering = candidate_score.total_cmp(&best_score).then_with(|| {
                best.core()
                    .assigned_count()
                    .cmp(&candidate.core().assigned_count())
                    .then_with(|| candidate.config().priority.cmp(&best.config().priority))
            });
            if ordering == std::cmp::Ordering::Greater {
                best = candidate;
                best_score = candidate_score;
            }
        }
        best
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use taskforce_agent::{
        Agent, AgentConfig, AgentCore, AgentKind, ExecutionOutput,
    };
    use taskforce_core::{TaskDescriptor, TaskforceResult};
    use uuid::Uuid;

    struct StubAgent {
        core: AgentCore,
    }

    #[async_trait]
    impl Agent for StubAgent {
        fn core(&self) -> &AgentCore {
            &self.core
        }

        async fn execute(&self, _task: &Task) -> TaskforceResult<ExecutionOutput> {
            Ok(ExecutionOutput::default())
        }
    }

    fn stub(max_concurrent: usize) -> Arc<dyn Agent> {
        let mut config = AgentConfig::for_kind(AgentKind::Revenue, "stub");
        config.max_concurrent_tasks = max_concurrent;
        Arc::new(StubAgent {
            core: AgentCore::new(config),
        })
    }

    fn revenue_task() -> Task {
        Task::from_descriptor(TaskDescriptor::new("revenue_generation"))
    }

    /// Shape an agent's statistics by settling synthetic outcomes.
    fn seed_outcomes(agent: &Arc<dyn Agent>, successes: u32, failures: u32, elapsed_ms: u64) {
        for _ in 0..successes {
            let id = Uuid::new_v4();
            agent.try_assign(id).unwrap();
            agent.complete(id, true, elapsed_ms, None);
        }
        for _ in 0..failures {
            let id = Uuid::new_v4();
            agent.try_assign(id).unwrap();
            agent.complete(id, false, elapsed_ms, None);
        }
    }

    #[test]
    fn test_no_candidate_for_unserved_type() {
        let dispatcher = Dispatcher::new(LoadBalancingStrategy::RoundRobin);
        let agents = vec![stub(1)];
        let task = Task::from_descriptor(TaskDescriptor::new("telemetry"));
        assert!(dispatcher.select(&task, &agents).is_none());
    }

    #[test]
    fn test_busy_agents_are_not_candidates() {
        let dispatcher = Dispatcher::new(LoadBalancingStrategy::RoundRobin);
        let agent = stub(1);
        agent.try_assign(Uuid::new_v4()).unwrap();
        let agents = vec![agent];
        assert!(dispatcher.select(&revenue_task(), &agents).is_none());
    }

    #[test]
    fn test_round_robin_cycles_through_all_candidates() {
        let dispatcher = Dispatcher::new(LoadBalancingStrategy::RoundRobin);
        let agents: Vec<Arc<dyn Agent>> = (0..3).map(|_| stub(10)).collect();
        let task = revenue_task();

        let mut seen = HashSet::new();
        for _ in 0..3 {
            let chosen = dispatcher.select(&task, &agents).unwrap();
            seen.insert(chosen.id());
        }
        assert_eq!(seen.len(), 3);

        // the fourth pick wraps around
        let fourth = dispatcher.select(&task, &agents).unwrap();
        assert!(seen.contains(&fourth.id()));
    }

    #[test]
    fn test_performance_based_prefers_efficient_agent() {
        let dispatcher = Dispatcher::new(LoadBalancingStrategy::PerformanceBased);
        let strong = stub(10);
        let weak = stub(10);
        seed_outcomes(&strong, 9, 1, 100); // ~0.9 success, fast
        seed_outcomes(&weak, 4, 6, 100); // ~0.4 success
        let agents = vec![Arc::clone(&weak), Arc::clone(&strong)];

        // as long as the strong agent stays available, it is always picked
        for _ in 0..5 {
            let chosen = dispatcher.select(&revenue_task(), &agents).unwrap();
            assert_eq!(chosen.id(), strong.id());
        }
    }

    #[test]
    fn test_performance_tie_broken_by_lower_assignment() {
        let dispatcher = Dispatcher::new(LoadBalancingStrategy::PerformanceBased);
        let busy = stub(10);
        let idle = stub(10);
        busy.try_assign(Uuid::new_v4()).unwrap();
        let agents = vec![Arc::clone(&busy), Arc::clone(&idle)];
        let chosen = dispatcher.select(&revenue_task(), &agents).unwrap();
        assert_eq!(chosen.id(), idle.id());
    }

    #[test]
    fn test_task_affinity_prefers_experience() {
        let dispatcher = Dispatcher::new(LoadBalancingStrategy::TaskAffinity);
        let veteran = stub(10);
        let rookie = stub(10);
        seed_outcomes(&veteran, 20, 0, 100);
        seed_outcomes(&rookie, 2, 0, 100);
        let agents = vec![Arc::clone(&rookie), Arc::clone(&veteran)];
        let chosen = dispatcher.select(&revenue_task(), &agents).unwrap();
        assert_eq!(chosen.id(), veteran.id());
    }
}
