use crate::dispatcher::Dispatcher;
use crate::health::{HealthMonitor, HealthVerdict};
use crate::scaler::{AutoScaler, ScalingContext, ScalingDecision};
use crate::state::{AgentRecord, StateStore};
use crate::task_queue::TaskQueue;
use crate::types::{WorkforceConfig, WorkforceMetrics};
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use taskforce_agent::{Agent, AgentConfig, AgentCore, AgentFactory, AgentKind, AgentPerformance};
use taskforce_core::{
    AgentId, Task, TaskDescriptor, TaskId, TaskStatus, TaskforceError, TaskforceResult,
};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Queued tasks passed over this many dispatch cycles count as starving
/// in the metrics view.
const STARVING_ATTEMPTS: u32 = 5;

/// Everything the periodic loops and spawned executions share.
struct Shared {
    config: WorkforceConfig,
    factory: AgentFactory,
    queue: RwLock<TaskQueue>,
    agents: RwLock<Vec<Arc<dyn Agent>>>,
    processing: RwLock<HashMap<TaskId, Task>>,
    finished: RwLock<VecDeque<Task>>,
    dispatcher: Dispatcher,
    scaler: AutoScaler,
    health: HealthMonitor,
    store: Option<Arc<dyn StateStore>>,
    total_processed: AtomicU64,
    completion_ms_total: AtomicU64,
    in_flight: AtomicUsize,
    spawn_seq: AtomicUsize,
}

/// Façade composing the queue, the agent pool, the dispatcher, the
/// auto-scaler, and the health monitor.
///
/// Constructed explicitly by the embedder and shared as `Arc`; the manager
/// exclusively owns the queue and the agent collection. `start` launches
/// the periodic dispatch, scale, and health loops; `stop` halts them
/// deterministically and drains in-flight work.
pub struct WorkforceManager {
    shared: Arc<Shared>,
    shutdown: watch::Sender<bool>,
    loops: parking_lot::Mutex<Vec<JoinHandle<()>>>,
    running: AtomicBool,
}

impl WorkforceManager {
    /// Manager without persistence.
    pub fn new(config: WorkforceConfig, factory: AgentFactory) -> Self {
        Self::with_store(config, factory, None)
    }

    /// Manager with an optional state store for restart persistence.
    pub fn with_store(
        config: WorkforceConfig,
        factory: AgentFactory,
        store: Option<Arc<dyn StateStore>>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        let shared = Shared {
            queue: RwLock::new(TaskQueue::new(config.task_queue_size)),
            agents: RwLock::new(Vec::new()),
            processing: RwLock::new(HashMap::new()),
            finished: RwLock::new(VecDeque::new()),
            dispatcher: Dispatcher::new(config.load_balancing),
            scaler: AutoScaler::new(config.auto_scaling, config.agent_kinds.clone()),
            health: HealthMonitor::new(config.performance_threshold),
            store,
            total_processed: AtomicU64::new(0),
            completion_ms_total: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            spawn_seq: AtomicUsize::new(0),
            factory,
            config,
        };
        Self {
            shared: Arc::new(shared),
            shutdown,
            loops: parking_lot::Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
        }
    }

    /// The workforce configuration.
    pub fn config(&self) -> &WorkforceConfig {
        &self.shared.config
    }

    /// Spawn the configured initial distribution of agents, restoring
    /// prior state through the state store when one is configured and
    /// readable. Idempotent: a populated pool is left untouched.
    pub async fn initialize(&self) -> TaskforceResult<()> {
        let config = &self.shared.config;
        if config.agent_kinds.is_empty() {
            return Err(TaskforceError::Config(
                "workforce needs at least one agent kind".to_string(),
            ));
        }
        let mut agents = self.shared.agents.write().await;
        if !agents.is_empty() {
            return Ok(());
        }

        if let Some(store) = &self.shared.store {
            match store.load().await {
                Ok(records) if !records.is_empty() => {
                    for record in records {
                        let core = AgentCore::restore(
                            record.config,
                            record.tasks_completed,
                            record.tasks_failed,
                            record.total_reported_value,
                        );
                        match self.shared.factory.build(core) {
                            Ok(agent) => agents.push(agent),
                            Err(e) => warn!(error = %e, "skipping unrestorable agent"),
                        }
                    }
                    if !agents.is_empty() {
                        self.shared.spawn_seq.store(agents.len(), Ordering::SeqCst);
                        info!(count = agents.len(), "workforce restored from state store");
                        return Ok(());
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "state store unavailable, cold-starting"),
            }
        }

        for i in 0..config.initial_agents {
            let kind = config.agent_kinds[i % config.agent_kinds.len()];
            spawn_agent(&self.shared, &mut agents, kind)?;
        }
        info!(count = agents.len(), "workforce initialized");
        Ok(())
    }

    /// Launch the dispatch, scale, and health loops. Idempotent.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown.send(false);

        let mut loops = self.loops.lock();
        loops.push(tokio::spawn(run_loop(
            Arc::clone(&self.shared),
            self.shutdown.subscribe(),
            self.shared.config.dispatch_interval_ms,
            LoopKind::Dispatch,
        )));
        loops.push(tokio::spawn(run_loop(
            Arc::clone(&self.shared),
            self.shutdown.subscribe(),
            self.shared.config.scale_interval_ms,
            LoopKind::Scale,
        )));
        loops.push(tokio::spawn(run_loop(
            Arc::clone(&self.shared),
            self.shutdown.subscribe(),
            self.shared.config.health_interval_ms,
            LoopKind::Health,
        )));
        info!("workforce manager started");
    }

    /// Halt the periodic loops, drain in-flight executions (bounded by
    /// `drain_timeout_ms`), and persist state when a store is configured.
    /// Idempotent: a second call is a no-op.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown.send(true);

        let handles: Vec<JoinHandle<()>> = self.loops.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }

        let deadline = Instant::now() + Duration::from_millis(self.shared.config.drain_timeout_ms);
        while self.shared.in_flight.load(Ordering::SeqCst) > 0 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let remaining = self.shared.in_flight.load(Ordering::SeqCst);
        if remaining > 0 {
            warn!(remaining, "drain timeout elapsed with executions in flight");
        }

        if let Some(store) = &self.shared.store {
            let records: Vec<AgentRecord> = {
                let agents = self.shared.agents.read().await;
                agents.iter().map(AgentRecord::from_agent).collect()
            };
            if let Err(e) = store.save(&records).await {
                warn!(error = %e, "failed to persist workforce state");
            }
        }
        info!("workforce manager stopped");
    }

    /// Submit a task for dispatch. Fails with `QueueFull` at capacity;
    /// the capacity check and the insert are atomic under the queue lock,
    /// so concurrent submissions cannot overfill the queue.
    pub async fn submit_task(&self, descriptor: TaskDescriptor) -> TaskforceResult<TaskId> {
        let task = Task::from_descriptor(descriptor);
        let mut queue = self.shared.queue.write().await;
        let id = queue.submit(task)?;
        debug!(task = %id, "task queued");
        Ok(id)
    }

    /// Look up a task wherever it currently lives: queue, processing set,
    /// or the bounded finished history.
    pub async fn task_status(&self, id: TaskId) -> Option<Task> {
        if let Some(task) = self.shared.queue.read().await.get(id) {
            return Some(task.clone());
        }
        if let Some(task) = self.shared.processing.read().await.get(&id) {
            return Some(task.clone());
        }
        self.shared
            .finished
            .read()
            .await
            .iter()
            .find(|task| task.id == id)
            .cloned()
    }

    /// Recompute the derived metrics view.
    pub async fn metrics(&self) -> WorkforceMetrics {
        let agents = self.shared.agents.read().await;
        let live: Vec<&Arc<dyn Agent>> = agents
            .iter()
            .filter(|agent| !agent.core().is_retired())
            .collect();
        let total_agents = live.len();
        let active_agents = live
            .iter()
            .filter(|agent| agent.core().assigned_count() > 0)
            .count();

        let mut agent_kind_distribution: HashMap<String, usize> = HashMap::new();
        let mut efficiency_sum = 0.0;
        for agent in &live {
            *agent_kind_distribution
                .entry(agent.kind().to_string())
                .or_insert(0) += 1;
            efficiency_sum += agent.performance().efficiency;
        }
        let overall_efficiency = if total_agents == 0 {
            0.0
        } else {
            efficiency_sum / total_agents as f64
        };

        let queue = self.shared.queue.read().await;
        let queue_length = queue.len();
        let starving_tasks = queue
            .iter()
            .filter(|task| task.dispatch_attempts >= STARVING_ATTEMPTS)
            .count();
        let max_dispatch_attempts = queue
            .iter()
            .map(|task| task.dispatch_attempts)
            .max()
            .unwrap_or(0);
        let oldest_queued_ms = queue.iter().map(Task::age_ms).max().unwrap_or(0);
        drop(queue);

        let total_tasks_processed = self.shared.total_processed.load(Ordering::SeqCst);
        let average_completion_ms = if total_tasks_processed == 0 {
            0.0
        } else {
            self.shared.completion_ms_total.load(Ordering::SeqCst) as f64
                / total_tasks_processed as f64
        };

        WorkforceMetrics {
            total_agents,
            active_agents,
            idle_agents: total_agents - active_agents,
            queue_length,
            total_tasks_processed,
            average_completion_ms,
            overall_efficiency,
            system_load: if total_agents == 0 {
                0.0
            } else {
                active_agents as f64 / total_agents as f64
            },
            agent_kind_distribution,
            starving_tasks,
            max_dispatch_attempts,
            oldest_queued_ms,
        }
    }

    /// Performance statistics for one agent.
    pub async fn agent_performance(&self, id: AgentId) -> Option<AgentPerformance> {
        let agents = self.shared.agents.read().await;
        agents
            .iter()
            .find(|agent| agent.id() == id)
            .map(|agent| agent.performance())
    }

    /// Performance statistics for every live agent.
    pub async fn all_agent_performance(&self) -> Vec<AgentPerformance> {
        let agents = self.shared.agents.read().await;
        agents
            .iter()
            .filter(|agent| !agent.core().is_retired())
            .map(|agent| agent.performance())
            .collect()
    }

    /// Manually resize the pool, overriding the auto-scaler. The target
    /// is clamped to `[1, max_agents]`. Shrinking marks the most recently
    /// created agents retired; they drain before removal.
    pub async fn scale_to(&self, target: usize) -> TaskforceResult<()> {
        let target = target.clamp(1, self.shared.config.max_agents);
        let mut agents = self.shared.agents.write().await;
        let live = agents
            .iter()
            .filter(|agent| !agent.core().is_retired())
            .count();

        if target > live {
            let kinds = &self.shared.config.agent_kinds;
            if kinds.is_empty() {
                return Err(TaskforceError::Config(
                    "workforce needs at least one agent kind".to_string(),
                ));
            }
            for i in 0..(target - live) {
                spawn_agent(&self.shared, &mut agents, kinds[i % kinds.len()])?;
            }
        } else if target < live {
            let mut candidates: Vec<Arc<dyn Agent>> = agents
                .iter()
                .filter(|agent| !agent.core().is_retired())
                .map(Arc::clone)
                .collect();
            candidates.sort_by_key(|agent| std::cmp::Reverse(agent.core().created_at()));
            for agent in candidates.into_iter().take(live - target) {
                agent.core().retire();
                debug!(agent = %agent.id(), "agent marked for retirement");
            }
            agents.retain(|agent| {
                !(agent.core().is_retired() && agent.core().assigned_count() == 0)
            });
        }
        info!(target, "workforce manually scaled");
        Ok(())
    }
}

enum LoopKind {
    Dispatch,
    Scale,
    Health,
}

/// One periodic loop: a stoppable ticker selecting over the shutdown
/// signal. Cycle errors are logged and the loop continues on its next
/// tick; they never terminate the manager.
async fn run_loop(
    shared: Arc<Shared>,
    mut shutdown: watch::Receiver<bool>,
    period_ms: u64,
    kind: LoopKind,
) {
    let mut ticker = tokio::time::interval(Duration::from_millis(period_ms.max(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                match kind {
                    LoopKind::Dispatch => dispatch_cycle(&shared).await,
                    LoopKind::Scale => scale_cycle(&shared).await,
                    LoopKind::Health => health_cycle(&shared).await,
                }
            }
        }
    }
}

/// Spawn a fresh agent of the given kind into the pool. The workforce
/// performance threshold overrides the kind default.
fn spawn_agent(
    shared: &Shared,
    agents: &mut Vec<Arc<dyn Agent>>,
    kind: AgentKind,
) -> TaskforceResult<Arc<dyn Agent>> {
    let seq = shared.spawn_seq.fetch_add(1, Ordering::SeqCst);
    let mut config = AgentConfig::for_kind(kind, format!("{kind}-{seq}"));
    config.performance_threshold = shared.config.performance_threshold;
    let agent = shared.factory.spawn(config)?;
    info!(agent = %agent.id(), name = %agent.name(), "agent spawned");
    agents.push(Arc::clone(&agent));
    Ok(agent)
}

/// One dispatch cycle: pop the highest-priority task, match it to an
/// agent, and hand the execution to a spawned future. Stops on an empty
/// queue, an idle-free pool, or back-pressure from an unservable task.
async fn dispatch_cycle(shared: &Arc<Shared>) {
    loop {
        let agents: Vec<Arc<dyn Agent>> = shared.agents.read().await.clone();
        if !agents.iter().any(|agent| agent.is_available()) {
            break;
        }

        let Some(mut entry) = shared.queue.write().await.pop_next() else {
            break;
        };

        let Some(agent) = shared.dispatcher.select(&entry.task, &agents) else {
            entry.task.dispatch_attempts += 1;
            if entry.task.dispatch_attempts >= shared.config.max_dispatch_attempts {
                warn!(
                    task = %entry.task.id,
                    task_type = %entry.task.task_type,
                    attempts = entry.task.dispatch_attempts,
                    "no capable agent after retry budget, dead-lettering task"
                );
                let mut task = entry.task;
                task.status = TaskStatus::Failed;
                task.error =
                    Some(TaskforceError::NoCapableAgent(task.task_type.clone()).to_string());
                task.completed_at = Some(Utc::now());
                push_finished(shared, task).await;
                continue;
            }
            // back-pressure: restore the task's slot and end the cycle
            shared.queue.write().await.requeue_front(entry);
            break;
        };

        if let Err(e) = agent.try_assign(entry.task.id) {
            warn!(agent = %agent.id(), error = %e, "assignment refused, requeueing task");
            shared.queue.write().await.requeue_front(entry);
            break;
        }

        let mut task = entry.task;
        task.status = TaskStatus::Processing;
        task.assigned_agent = Some(agent.id());
        task.started_at = Some(Utc::now());
        shared
            .processing
            .write()
            .await
            .insert(task.id, task.clone());
        shared.in_flight.fetch_add(1, Ordering::SeqCst);

        let shared = Arc::clone(shared);
        tokio::spawn(async move {
            execute_task(shared, agent, task).await;
        });
    }
}

/// Await one execution (with the task's optional deadline) and settle it.
async fn execute_task(shared: Arc<Shared>, agent: Arc<dyn Agent>, task: Task) {
    let started = Instant::now();
    let result = match task.timeout_ms {
        Some(ms) => {
            match tokio::time::timeout(Duration::from_millis(ms), agent.execute(&task)).await {
                Ok(result) => result,
                Err(_) => Err(TaskforceError::Execution(format!(
                    "deadline of {ms}ms exceeded"
                ))),
            }
        }
        None => agent.execute(&task).await,
    };
    let elapsed_ms = started.elapsed().as_millis() as u64;

    let success = result.is_ok();
    let reported_value = result.as_ref().ok().and_then(|output| output.reported_value);
    agent.complete(task.id, success, elapsed_ms, reported_value);

    let removed = shared.processing.write().await.remove(&task.id);
    let Some(mut task) = removed else {
        // already settled externally (agent hard-retired); only the slot
        // release and the performance record above were still owed
        debug!(task = %task.id, "late settlement for externally failed task");
        shared.in_flight.fetch_sub(1, Ordering::SeqCst);
        return;
    };

    task.completed_at = Some(Utc::now());
    match result {
        Ok(output) => {
            task.status = TaskStatus::Completed;
            task.reported_value = output.reported_value;
            task.result = Some(output.output);
            debug!(task = %task.id, agent = %agent.id(), elapsed_ms, "task completed");
        }
        Err(e) => {
            task.status = TaskStatus::Failed;
            task.error = Some(e.to_string());
            warn!(task = %task.id, agent = %agent.id(), error = %e, "task failed");
        }
    }
    shared.total_processed.fetch_add(1, Ordering::SeqCst);
    shared
        .completion_ms_total
        .fetch_add(elapsed_ms, Ordering::SeqCst);
    push_finished(&shared, task).await;
    shared.in_flight.fetch_sub(1, Ordering::SeqCst);
}

/// Retain a terminal task in the bounded finished history.
async fn push_finished(shared: &Arc<Shared>, task: Task) {
    let mut finished = shared.finished.write().await;
    finished.push_back(task);
    while finished.len() > shared.config.finished_history_size {
        finished.pop_front();
    }
}

/// One auto-scale cycle: sweep drained retirees, then evaluate and apply
/// a scaling decision.
async fn scale_cycle(shared: &Arc<Shared>) {
    sweep_retired(shared).await;
    if !shared.config.auto_scaling {
        return;
    }

    let context = scaling_context(shared).await;
    match shared.scaler.evaluate(&context) {
        ScalingDecision::None => {}
        ScalingDecision::ScaleUp { kinds, reason } => {
            info!(count = kinds.len(), %reason, "scaling up");
            let mut agents = shared.agents.write().await;
            for kind in kinds {
                if let Err(e) = spawn_agent(shared, &mut agents, kind) {
                    error!(error = %e, "failed to spawn agent during scale-up");
                }
            }
        }
        ScalingDecision::ScaleDown {
            count,
            kind,
            reason,
        } => {
            info!(count, %reason, "scaling down");
            let agents = shared.agents.read().await;
            let mut candidates: Vec<&Arc<dyn Agent>> = agents
                .iter()
                .filter(|agent| !agent.core().is_retired())
                .filter(|agent| kind.map_or(true, |k| agent.kind() == k))
                .collect();
            candidates.sort_by_key(|agent| std::cmp::Reverse(agent.core().created_at()));
            for agent in candidates.into_iter().take(count) {
                agent.core().retire();
                debug!(agent = %agent.id(), "agent marked for retirement, draining");
            }
        }
    }
}

/// Remove retired agents whose in-flight work has drained.
async fn sweep_retired(shared: &Arc<Shared>) {
    let mut agents = shared.agents.write().await;
    let before = agents.len();
    agents.retain(|agent| !(agent.core().is_retired() && agent.core().assigned_count() == 0));
    let removed = before - agents.len();
    if removed > 0 {
        debug!(removed, "drained retired agents removed from pool");
    }
}

/// Snapshot the inputs the auto-scaler needs.
async fn scaling_context(shared: &Arc<Shared>) -> ScalingContext {
    let agents = shared.agents.read().await;
    let live: Vec<&Arc<dyn Agent>> = agents
        .iter()
        .filter(|agent| !agent.core().is_retired())
        .collect();
    let mut kind_distribution: HashMap<AgentKind, usize> = HashMap::new();
    for agent in &live {
        *kind_distribution.entry(agent.kind()).or_insert(0) += 1;
    }
    let active_agents = live
        .iter()
        .filter(|agent| agent.core().assigned_count() > 0)
        .count();
    let total_agents = live.len();
    drop(agents);

    let queue = shared.queue.read().await;
    let mut queued_types: HashMap<String, usize> = HashMap::new();
    for task in queue.iter() {
        *queued_types.entry(task.task_type.clone()).or_insert(0) += 1;
    }

    ScalingContext {
        total_agents,
        active_agents,
        queue_length: queue.len(),
        queue_capacity: queue.capacity(),
        min_agents: shared.config.min_agents.max(1),
        max_agents: shared.config.max_agents,
        queued_types,
        kind_distribution,
    }
}

/// One health cycle: warn on the soft band, retire-and-replace below the
/// hard floor.
async fn health_cycle(shared: &Arc<Shared>) {
    let agents: Vec<Arc<dyn Agent>> = shared.agents.read().await.clone();
    for agent in agents {
        if agent.core().is_retired() {
            continue;
        }
        let performance = agent.performance();
        match shared.health.assess(&performance) {
            HealthVerdict::Healthy => {}
            HealthVerdict::Underperforming => {
                warn!(
                    agent = %agent.id(),
                    name = %agent.name(),
                    success_rate = performance.success_rate,
                    threshold = shared.config.performance_threshold,
                    "agent underperforming"
                );
            }
            HealthVerdict::Retire => retire_and_replace(shared, &agent, &performance).await,
        }
    }
}

/// Retire a chronically failing agent: fail its in-flight tasks so
/// callers can resubmit, then spawn a same-kind replacement so the pool
/// size is unchanged.
async fn retire_and_replace(
    shared: &Arc<Shared>,
    agent: &Arc<dyn Agent>,
    performance: &AgentPerformance,
) {
    warn!(
        agent = %agent.id(),
        name = %agent.name(),
        success_rate = performance.success_rate,
        "retiring chronically failing agent"
    );
    agent.core().retire();

    let stranded: Vec<Task> = {
        let mut processing = shared.processing.write().await;
        let ids: Vec<TaskId> = processing
            .values()
            .filter(|task| task.assigned_agent == Some(agent.id()))
            .map(|task| task.id)
            .collect();
        ids.iter().filter_map(|id| processing.remove(id)).collect()
    };
    for mut task in stranded {
        let elapsed_ms = task
            .started_at
            .map(|started| {
                Utc::now()
                    .signed_duration_since(started)
                    .num_milliseconds()
                    .max(0) as u64
            })
            .unwrap_or(0);
        task.status = TaskStatus::Failed;
        task.error = Some(TaskforceError::AgentRetired(agent.id()).to_string());
        task.completed_at = Some(Utc::now());
        warn!(task = %task.id, "in-flight task failed by agent retirement");
        shared.total_processed.fetch_add(1, Ordering::SeqCst);
        shared
            .completion_ms_total
            .fetch_add(elapsed_ms, Ordering::SeqCst);
        push_finished(shared, task).await;
    }

    let mut agents = shared.agents.write().await;
    match spawn_agent(shared, &mut agents, agent.kind()) {
        Ok(replacement) => {
            info!(
                retired = %agent.id(),
                replacement = %replacement.id(),
                "replacement agent spawned"
            );
        }
        Err(e) => error!(error = %e, "failed to spawn replacement agent"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use taskforce_agent::{default_factory, ExecutionOutput, TaskExecutor};
    use tokio::sync::Semaphore;
    use uuid::Uuid;

    /// Settles immediately with an empty success.
    struct InstantExecutor;

    #[async_trait]
    impl TaskExecutor for InstantExecutor {
        async fn run(
            &self,
            task: &Task,
            _config: &AgentConfig,
        ) -> TaskforceResult<ExecutionOutput> {
            Ok(ExecutionOutput::new(serde_json::json!({
                "echo": task.task_type,
            }))
            .with_value(1.0))
        }
    }

    /// Blocks until a permit is released, one permit per execution.
    struct GatedExecutor {
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl TaskExecutor for GatedExecutor {
        async fn run(
            &self,
            _task: &Task,
            _config: &AgentConfig,
        ) -> TaskforceResult<ExecutionOutput> {
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| TaskforceError::Execution(e.to_string()))?;
            permit.forget();
            Ok(ExecutionOutput::default())
        }
    }

    fn factory_with(executor: Arc<dyn TaskExecutor>) -> taskforce_agent::AgentFactory {
        let mut factory = default_factory();
        for kind in AgentKind::ALL {
            if factory.is_registered(kind) {
                factory.register_executor(kind, Arc::clone(&executor));
            }
        }
        factory
    }

    async fn manager_with(
        config: WorkforceConfig,
        executor: Arc<dyn TaskExecutor>,
    ) -> WorkforceManager {
        let manager = WorkforceManager::new(config, factory_with(executor));
        manager.initialize().await.unwrap();
        manager
    }

    async fn wait_for_idle(manager: &WorkforceManager) {
        for _ in 0..500 {
            if manager.shared.in_flight.load(Ordering::SeqCst) == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("executions did not drain");
    }

    fn small_config() -> WorkforceConfig {
        WorkforceConfig {
            initial_agents: 1,
            agent_kinds: vec![AgentKind::Revenue],
            auto_scaling: false,
            ..WorkforceConfig::default()
        }
    }

    #[tokio::test]
    async fn test_queue_capacity_rejects_overflow() {
        let config = WorkforceConfig {
            task_queue_size: 2,
            ..small_config()
        };
        let manager = manager_with(config, Arc::new(InstantExecutor)).await;

        // a type no agent serves, so nothing drains the queue
        let first = manager
            .submit_task(TaskDescriptor::new("telemetry"))
            .await
            .unwrap();
        let second = manager
            .submit_task(TaskDescriptor::new("telemetry"))
            .await
            .unwrap();
        let err = manager
            .submit_task(TaskDescriptor::new("telemetry"))
            .await
            .unwrap_err();

        assert!(matches!(err, TaskforceError::QueueFull(2)));
        for id in [first, second] {
            let task = manager.task_status(id).await.unwrap();
            assert_eq!(task.status, TaskStatus::Queued);
        }
    }

    #[tokio::test]
    async fn test_dispatch_settles_task_and_pairs_completion() {
        let manager = manager_with(small_config(), Arc::new(InstantExecutor)).await;
        let id = manager
            .submit_task(TaskDescriptor::new("revenue_generation"))
            .await
            .unwrap();

        dispatch_cycle(&manager.shared).await;
        wait_for_idle(&manager).await;

        let task = manager.task_status(id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.assigned_agent.is_some());
        assert!(task.result.is_some());
        assert_eq!(task.reported_value, Some(1.0));

        let performances = manager.all_agent_performance().await;
        assert_eq!(performances.len(), 1);
        assert_eq!(performances[0].tasks_completed, 1);

        // the capacity slot was released exactly once
        let agents = manager.shared.agents.read().await;
        assert_eq!(agents[0].core().assigned_count(), 0);

        let metrics = manager.metrics().await;
        assert_eq!(metrics.total_tasks_processed, 1);
    }

    #[tokio::test]
    async fn test_execution_failure_is_recorded_not_propagated() {
        struct FailingExecutor;

        #[async_trait]
        impl TaskExecutor for FailingExecutor {
            async fn run(
                &self,
                _task: &Task,
                _config: &AgentConfig,
            ) -> TaskforceResult<ExecutionOutput> {
                Err(TaskforceError::Execution("domain exploded".to_string()))
            }
        }

        let manager = manager_with(small_config(), Arc::new(FailingExecutor)).await;
        let id = manager
            .submit_task(TaskDescriptor::new("revenue_generation"))
            .await
            .unwrap();

        dispatch_cycle(&manager.shared).await;
        wait_for_idle(&manager).await;

        let task = manager.task_status(id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.error.as_deref().unwrap().contains("domain exploded"));

        let perf = &manager.all_agent_performance().await[0];
        assert_eq!(perf.tasks_failed, 1);

        // dispatch keeps running for later tasks
        let next = manager
            .submit_task(TaskDescriptor::new("revenue_generation"))
            .await
            .unwrap();
        dispatch_cycle(&manager.shared).await;
        wait_for_idle(&manager).await;
        assert_eq!(
            manager.task_status(next).await.unwrap().status,
            TaskStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_task_deadline_settles_as_failure() {
        let gate = Arc::new(Semaphore::new(0));
        let manager = manager_with(
            small_config(),
            Arc::new(GatedExecutor {
                gate: Arc::clone(&gate),
            }),
        )
        .await;

        let id = manager
            .submit_task(TaskDescriptor::new("revenue_generation").with_timeout_ms(20))
            .await
            .unwrap();
        dispatch_cycle(&manager.shared).await;
        wait_for_idle(&manager).await;

        let task = manager.task_status(id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.error.as_deref().unwrap().contains("deadline"));

        // the slot came back
        let agents = manager.shared.agents.read().await;
        assert_eq!(agents[0].core().assigned_count(), 0);
    }

    #[tokio::test]
    async fn test_single_slot_agent_serializes_tasks() {
        let gate = Arc::new(Semaphore::new(0));
        let manager = manager_with(
            small_config(),
            Arc::new(GatedExecutor {
                gate: Arc::clone(&gate),
            }),
        )
        .await;
        {
            let agents = manager.shared.agents.read().await;
            agents[0].update_config(taskforce_agent::AgentConfigUpdate {
                max_concurrent_tasks: Some(1),
                ..Default::default()
            });
        }

        let first = manager
            .submit_task(TaskDescriptor::new("revenue_generation"))
            .await
            .unwrap();
        let second = manager
            .submit_task(TaskDescriptor::new("revenue_generation"))
            .await
            .unwrap();

        dispatch_cycle(&manager.shared).await;
        assert_eq!(
            manager.task_status(first).await.unwrap().status,
            TaskStatus::Processing
        );
        assert_eq!(
            manager.task_status(second).await.unwrap().status,
            TaskStatus::Queued
        );

        // still queued while the agent is saturated
        dispatch_cycle(&manager.shared).await;
        assert_eq!(
            manager.task_status(second).await.unwrap().status,
            TaskStatus::Queued
        );

        gate.add_permits(1);
        wait_for_idle(&manager).await;
        assert_eq!(
            manager.task_status(first).await.unwrap().status,
            TaskStatus::Completed
        );

        dispatch_cycle(&manager.shared).await;
        gate.add_permits(1);
        wait_for_idle(&manager).await;
        assert_eq!(
            manager.task_status(second).await.unwrap().status,
            TaskStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_round_robin_spreads_across_pool() {
        let gate = Arc::new(Semaphore::new(0));
        let config = WorkforceConfig {
            initial_agents: 3,
            agent_kinds: vec![AgentKind::Revenue],
            auto_scaling: false,
            ..WorkforceConfig::default()
        };
        let manager = manager_with(
            config,
            Arc::new(GatedExecutor {
                gate: Arc::clone(&gate),
            }),
        )
        .await;

        for _ in 0..3 {
            manager
                .submit_task(TaskDescriptor::new("revenue_generation"))
                .await
                .unwrap();
        }
        dispatch_cycle(&manager.shared).await;

        let processing = manager.shared.processing.read().await;
        let assigned: HashSet<AgentId> = processing
            .values()
            .filter_map(|task| task.assigned_agent)
            .collect();
        assert_eq!(assigned.len(), 3, "each agent received one task");
        drop(processing);

        gate.add_permits(3);
        wait_for_idle(&manager).await;
    }

    #[tokio::test]
    async fn test_distribution_sums_to_total() {
        let config = WorkforceConfig {
            initial_agents: 5,
            agent_kinds: vec![AgentKind::Revenue, AgentKind::Market],
            auto_scaling: false,
            ..WorkforceConfig::default()
        };
        let manager = manager_with(config, Arc::new(InstantExecutor)).await;
        let metrics = manager.metrics().await;
        assert_eq!(metrics.total_agents, 5);
        assert_eq!(
            metrics.agent_kind_distribution.values().sum::<usize>(),
            metrics.total_agents
        );
    }

    #[tokio::test]
    async fn test_scale_up_under_queue_pressure() {
        let config = WorkforceConfig {
            initial_agents: 2,
            agent_kinds: vec![AgentKind::Revenue, AgentKind::Market],
            task_queue_size: 10,
            max_agents: 10,
            ..WorkforceConfig::default()
        };
        let manager = manager_with(config, Arc::new(InstantExecutor)).await;
        for _ in 0..8 {
            manager
                .submit_task(TaskDescriptor::new("telemetry"))
                .await
                .unwrap();
        }

        let before = manager.metrics().await.total_agents;
        scale_cycle(&manager.shared).await;
        let after = manager.metrics().await.total_agents;
        assert_eq!(after, before + 2);
        assert!(after <= manager.config().max_agents);
    }

    #[tokio::test]
    async fn test_scale_down_drains_idle_pool() {
        let config = WorkforceConfig {
            initial_agents: 4,
            agent_kinds: vec![AgentKind::Revenue, AgentKind::Market],
            min_agents: 1,
            ..WorkforceConfig::default()
        };
        let manager = manager_with(config, Arc::new(InstantExecutor)).await;

        // idle pool, empty queue: one decrement per cycle
        scale_cycle(&manager.shared).await;
        // the retiree had nothing in flight, so the next sweep removes it
        scale_cycle(&manager.shared).await;
        assert_eq!(manager.metrics().await.total_agents, 2);
    }

    #[tokio::test]
    async fn test_health_retires_and_replaces_same_kind() {
        let manager = manager_with(small_config(), Arc::new(InstantExecutor)).await;
        let (failing_id, failing_kind) = {
            let agents = manager.shared.agents.read().await;
            let agent = &agents[0];
            // 6 successes, 14 failures: rate 0.3 over 20 attempts
            for success in (0..20).map(|i| i < 6) {
                let task_id = Uuid::new_v4();
                agent.try_assign(task_id).unwrap();
                agent.complete(task_id, success, 50, None);
            }
            (agent.id(), agent.kind())
        };

        health_cycle(&manager.shared).await;
        sweep_retired(&manager.shared).await;

        let metrics = manager.metrics().await;
        assert_eq!(metrics.total_agents, 1, "pool size unchanged");
        let agents = manager.shared.agents.read().await;
        assert_ne!(agents[0].id(), failing_id);
        assert_eq!(agents[0].kind(), failing_kind);
    }

    #[tokio::test]
    async fn test_hard_retirement_fails_in_flight_task() {
        let gate = Arc::new(Semaphore::new(0));
        let manager = manager_with(
            small_config(),
            Arc::new(GatedExecutor {
                gate: Arc::clone(&gate),
            }),
        )
        .await;

        let id = manager
            .submit_task(TaskDescriptor::new("revenue_generation"))
            .await
            .unwrap();
        dispatch_cycle(&manager.shared).await;

        // make the busy agent retire-worthy while it holds the task
        {
            let agents = manager.shared.agents.read().await;
            let agent = &agents[0];
            for _ in 0..20 {
                let synthetic = Uuid::new_v4();
                agent.try_assign(synthetic).unwrap();
                agent.complete(synthetic, false, 10, None);
            }
        }
        health_cycle(&manager.shared).await;

        let task = manager.task_status(id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.error.as_deref().unwrap().contains("retired"));

        // the orphaned execution settles without disturbing the record
        gate.add_permits(1);
        wait_for_idle(&manager).await;
        assert_eq!(
            manager.task_status(id).await.unwrap().status,
            TaskStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_dead_letter_after_retry_budget() {
        let config = WorkforceConfig {
            max_dispatch_attempts: 2,
            ..small_config()
        };
        let manager = manager_with(config, Arc::new(InstantExecutor)).await;
        let id = manager
            .submit_task(TaskDescriptor::new("telemetry"))
            .await
            .unwrap();

        dispatch_cycle(&manager.shared).await;
        assert_eq!(
            manager.task_status(id).await.unwrap().status,
            TaskStatus::Queued
        );
        dispatch_cycle(&manager.shared).await;

        let task = manager.task_status(id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.error.as_deref().unwrap().contains("no capable agent"));
        // never executed, so not counted as processed
        assert_eq!(manager.metrics().await.total_tasks_processed, 0);
    }

    #[tokio::test]
    async fn test_manual_scaling_is_clamped() {
        let config = WorkforceConfig {
            initial_agents: 2,
            max_agents: 6,
            agent_kinds: vec![AgentKind::Revenue, AgentKind::Market],
            auto_scaling: false,
            ..WorkforceConfig::default()
        };
        let manager = manager_with(config, Arc::new(InstantExecutor)).await;

        manager.scale_to(4).await.unwrap();
        assert_eq!(manager.metrics().await.total_agents, 4);

        // clamped to max_agents
        manager.scale_to(50).await.unwrap();
        assert_eq!(manager.metrics().await.total_agents, 6);

        // clamped to 1, never 0
        manager.scale_to(0).await.unwrap();
        assert_eq!(manager.metrics().await.total_agents, 1);
    }

    #[tokio::test]
    async fn test_stop_twice_is_a_noop() {
        let manager = manager_with(small_config(), Arc::new(InstantExecutor)).await;
        manager.start().await;
        manager.stop().await;
        manager.stop().await;
        assert!(!manager.running.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_start_twice_spawns_loops_once() {
        let manager = manager_with(small_config(), Arc::new(InstantExecutor)).await;
        manager.start().await;
        manager.start().await;
        assert_eq!(manager.loops.lock().len(), 3);
        manager.stop().await;
    }

    #[tokio::test]
    async fn test_full_lifecycle_with_running_loops() {
        let config = WorkforceConfig {
            dispatch_interval_ms: 10,
            scale_interval_ms: 50,
            health_interval_ms: 50,
            ..small_config()
        };
        let manager = manager_with(config, Arc::new(InstantExecutor)).await;
        manager.start().await;

        let id = manager
            .submit_task(TaskDescriptor::new("revenue_generation"))
            .await
            .unwrap();
        for _ in 0..100 {
            if manager
                .task_status(id)
                .await
                .is_some_and(|task| task.is_terminal())
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        manager.stop().await;

        let task = manager.task_status(id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_state_round_trip_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn StateStore> = Arc::new(crate::state::JsonFileStateStore::new(
            dir.path().join("workforce.json"),
        ));

        let config = small_config();
        let manager = WorkforceManager::with_store(
            config.clone(),
            factory_with(Arc::new(InstantExecutor)),
            Some(Arc::clone(&store)),
        );
        manager.initialize().await.unwrap();
        let id = manager
            .submit_task(TaskDescriptor::new("revenue_generation"))
            .await
            .unwrap();
        dispatch_cycle(&manager.shared).await;
        wait_for_idle(&manager).await;
        assert!(manager.task_status(id).await.unwrap().is_terminal());
        manager.start().await;
        manager.stop().await;

        // a new manager restores the agent set with its counters
        let restored = WorkforceManager::with_store(
            config,
            factory_with(Arc::new(InstantExecutor)),
            Some(store),
        );
        restored.initialize().await.unwrap();
        let performances = restored.all_agent_performance().await;
        assert_eq!(performances.len(), 1);
        assert_eq!(performances[0].tasks_completed, 1);
    }
}
