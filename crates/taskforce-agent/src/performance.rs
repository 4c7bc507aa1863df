use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use taskforce_core::AgentId;

/// Completions kept for the moving execution-time average.
const RECENT_WINDOW: usize = 50;

/// Execution time (ms) at which the speed factor of the efficiency score
/// drops to one half.
const TIME_SCALE_MS: f64 = 10_000.0;

/// Snapshot of an agent's rolling performance statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPerformance {
    /// Agent these statistics belong to.
    pub agent_id: AgentId,
    /// Tasks settled successfully.
    pub tasks_completed: u64,
    /// Tasks settled with a failure.
    pub tasks_failed: u64,
    /// completed / (completed + failed); 1.0 with zero attempts.
    pub success_rate: f64,
    /// Mean execution time over the recent-completion window.
    pub average_execution_ms: f64,
    /// Composite score in [0, 1]: rises with success rate, falls with
    /// average execution time.
    pub efficiency: f64,
    /// Running sum of executor-reported values; reporting only.
    pub total_reported_value: f64,
}

#[derive(Debug, Default)]
struct PerfInner {
    completed: u64,
    failed: u64,
    recent_ms: VecDeque<u64>,
    total_value: f64,
}

/// Per-agent performance tracker.
///
/// Updated exclusively through task settlement; success rate and
/// efficiency are recomputed synchronously on every update so the
/// dispatcher and health monitor always observe current values. Memory is
/// bounded by the fixed recent-completion window.
#[derive(Debug)]
pub struct PerformanceTracker {
    agent_id: AgentId,
    inner: Mutex<PerfInner>,
}

impl PerformanceTracker {
    /// Fresh tracker with zero attempts.
    pub fn new(agent_id: AgentId) -> Self {
        Self {
            agent_id,
            inner: Mutex::new(PerfInner::default()),
        }
    }

    /// Tracker seeded with persisted counters. The execution-time window
    /// starts empty; the average repopulates as new completions arrive.
    pub fn restore(agent_id: AgentId, completed: u64, failed: u64, total_value: f64) -> Self {
        Self {
            agent_id,
            inner: Mutex::new(PerfInner {
                completed,
                failed,
                recent_ms: VecDeque::new(),
                total_value,
            }),
        }
    }

    /// Record one settled execution.
    pub fn record(&self, success: bool, elapsed_ms: u64, reported_value: Option<f64>) {
        let mut inner = self.inner.lock();
        if success {
            inner.completed += 1;
        } else {
            inner.failed += 1;
        }
        if inner.recent_ms.len() == RECENT_WINDOW {
            inner.recent_ms.pop_front();
        }
        inner.recent_ms.push_back(elapsed_ms);
        if let Some(value) = reported_value {
            inner.total_value += value;
        }
    }

    /// Current statistics.
    pub fn snapshot(&self) -> AgentPerformance {
        let inner = self.inner.lock();
        let attempts = inner.completed + inner.failed;
        let success_rate = if attempts == 0 {
            1.0
        } else {
            inner.completed as f64 / attempts as f64
        };
        let average_execution_ms = if inner.recent_ms.is_empty() {
            0.0
        } else {
            inner.recent_ms.iter().sum::<u64>() as f64 / inner.recent_ms.len() as f64
        };
        AgentPerformance {
            agent_id: self.agent_id,
            tasks_completed: inner.completed,
            tasks_failed: inner.failed,
            success_rate,
            average_execution_ms,
            efficiency: efficiency(success_rate, average_execution_ms),
            total_reported_value: inner.total_value,
        }
    }
}

/// `success_rate * TIME_SCALE / (TIME_SCALE + average_ms)`: bounded to
/// [0, 1], monotonically increasing in success rate and decreasing in
/// average execution time.
fn efficiency(success_rate: f64, average_ms: f64) -> f64 {
    success_rate * (TIME_SCALE_MS / (TIME_SCALE_MS + average_ms))
}
