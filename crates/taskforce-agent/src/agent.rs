use crate::config::{AgentConfig, AgentConfigUpdate, AgentKind};
use crate::executor::ExecutionOutput;
use crate::performance::{AgentPerformance, PerformanceTracker};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use taskforce_core::{AgentId, Task, TaskId, TaskforceError, TaskforceResult};
use tracing::debug;

/// Bookkeeping shared by every agent variant: configuration, the
/// assigned-slot counter, the retired flag, and the performance tracker.
///
/// `try_assign` and `complete` are the only mutators of the slot counter
/// and must be paired exactly once per assignment.
#[derive(Debug)]
pub struct AgentCore {
    id: AgentId,
    kind: AgentKind,
    config: RwLock<AgentConfig>,
    assigned: AtomicUsize,
    retired: AtomicBool,
    tracker: PerformanceTracker,
    created_at: DateTime<Utc>,
}

impl AgentCore {
    /// Core for a freshly spawned agent.
    pub fn new(config: AgentConfig) -> Self {
        let id = config.id;
        let kind = config.kind;
        Self {
            id,
            kind,
            config: RwLock::new(config),
            assigned: AtomicUsize::new(0),
            retired: AtomicBool::new(false),
            tracker: PerformanceTracker::new(id),
            created_at: Utc::now(),
        }
    }

    /// Core restored from persisted configuration and counters.
    pub fn restore(config: AgentConfig, completed: u64, failed: u64, total_value: f64) -> Self {
        let id = config.id;
        let kind = config.kind;
        Self {
            id,
            kind,
            config: RwLock::new(config),
            assigned: AtomicUsize::new(0),
            retired: AtomicBool::new(false),
            tracker: PerformanceTracker::restore(id, completed, failed, total_value),
            created_at: Utc::now(),
        }
    }

    /// Unique agent identifier.
    pub fn id(&self) -> AgentId {
        self.id
    }

    /// Worker specialization.
    pub fn kind(&self) -> AgentKind {
        self.kind
    }

    /// Human-readable name.
    pub fn name(&self) -> String {
        self.config.read().name.clone()
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> AgentConfig {
        self.config.read().clone()
    }

    /// Apply a partial configuration update.
    pub fn update_config(&self, update: AgentConfigUpdate) {
        self.config.write().apply(update);
    }

    /// When this core was constructed; used to pick the most recently
    /// created agents for scale-down.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Assignments currently held.
    pub fn assigned_count(&self) -> usize {
        self.assigned.load(Ordering::SeqCst)
    }

    /// Whether the agent has been marked retired.
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }

    /// Mark the agent retired; it refuses further assignments.
    pub fn retire(&self) {
        self.retired.store(true, Ordering::SeqCst);
    }

    /// Free capacity and not retired.
    pub fn is_available(&self) -> bool {
        !self.is_retired()
            && self.assigned.load(Ordering::SeqCst) < self.config.read().max_concurrent_tasks
    }

    /// Whether the task's type is within this agent's capability set.
    pub fn can_handle(&self, task: &Task) -> bool {
        self.config
            .read()
            .capabilities
            .iter()
            .any(|capability| capability == &task.task_type)
    }

    /// Take one capacity slot for the given task.
    ///
    /// Fails with `AgentRetired` once retired and `AgentAtCapacity` at the
    /// concurrency ceiling. The compare-exchange loop keeps the counter
    /// exact under concurrent assignment.
    pub fn try_assign(&self, task_id: TaskId) -> TaskforceResult<()> {
        if self.is_retired() {
            return Err(TaskforceError::AgentRetired(self.id));
        }
        let max = self.config.read().max_concurrent_tasks;
        let mut current = self.assigned.load(Ordering::SeqCst);
        loop {
            if current >= max {
                return Err(TaskforceError::AgentAtCapacity(self.id));
            }
            match self.assigned.compare_exchange(
                current,
                current + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
        debug!(agent = %self.id, task = %task_id, "task assigned");
        Ok(())
    }

    /// Release the capacity slot held for `task_id` and record the
    /// outcome on the performance tracker.
    pub fn complete(
        &self,
        task_id: TaskId,
        success: bool,
        elapsed_ms: u64,
        reported_value: Option<f64>,
    ) {
        let released = self
            .assigned
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                count.checked_sub(1)
            })
            .is_ok();
        if !released {
            debug!(agent = %self.id, task = %task_id, "completion with no held slot ignored");
            return;
        }
        self.tracker.record(success, elapsed_ms, reported_value);
        debug!(
            agent = %self.id,
            task = %task_id,
            success,
            elapsed_ms,
            "task settled"
        );
    }

    /// Current performance statistics.
    pub fn performance(&self) -> AgentPerformance {
        self.tracker.snapshot()
    }
}

/// A stateful worker with bounded concurrent capacity and tracked
/// performance.
///
/// Variants implement [`Agent::core`] and [`Agent::execute`]; identity,
/// capacity, and bookkeeping methods are provided by delegation to the
/// embedded [`AgentCore`].
#[async_trait]
pub trait Agent: Send + Sync {
    /// Bookkeeping shared by all agent variants.
    fn core(&self) -> &AgentCore;

    /// Execute one task. Domain-specific; the engine awaits this exactly
    /// once per assignment.
    async fn execute(&self, task: &Task) -> TaskforceResult<ExecutionOutput>;

    /// Hook invoked when the agent joins the pool.
    fn start(&self) {}

    /// Take the agent out of rotation; it refuses further assignments.
    fn stop(&self) {
        self.core().retire();
    }

    /// Unique agent identifier.
    fn id(&self) -> AgentId {
        self.core().id()
    }

    /// Worker specialization.
    fn kind(&self) -> AgentKind {
        self.core().kind()
    }

    /// Human-readable name.
    fn name(&self) -> String {
        self.core().name()
    }

    /// Free capacity and not retired.
    fn is_available(&self) -> bool {
        self.core().is_available()
    }

    /// Whether the task's type is within this agent's capability set.
    fn can_handle(&self, task: &Task) -> bool {
        self.core().can_handle(task)
    }

    /// Take one capacity slot for the given task.
    fn try_assign(&self, task_id: TaskId) -> TaskforceResult<()> {
        self.core().try_assign(task_id)
    }

    /// Release the slot held for `task_id` and record the outcome.
    fn complete(&self, task_id: TaskId, success: bool, elapsed_ms: u64, value: Option<f64>) {
        self.core().complete(task_id, success, elapsed_ms, value);
    }

    /// Current performance statistics.
    fn performance(&self) -> AgentPerformance {
        self.core().performance()
    }

    /// Snapshot of the current configuration.
    fn config(&self) -> AgentConfig {
        self.core().config()
    }

    /// Apply a partial configuration update.
    fn update_config(&self, update: AgentConfigUpdate) {
        self.core().update_config(update);
    }
}

impl std::fmt::Debug for dyn Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .field("name", &self.name())
            .finish()
    }
}
