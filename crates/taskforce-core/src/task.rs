use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier of a task.
pub type TaskId = Uuid;
/// Unique identifier of an agent.
pub type AgentId = Uuid;

/// Status of a task in the dispatch pipeline.
///
/// `Completed` and `Failed` are terminal; no implicit retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting in the queue for a capable, available agent.
    Queued,
    /// Assigned to an agent; execution in flight.
    Processing,
    /// Execution settled successfully.
    Completed,
    /// Execution settled with an error, timed out, or was dead-lettered.
    Failed,
}

/// What a caller submits: the schedulable part of a task, without any of the
/// bookkeeping the engine fills in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDescriptor {
    /// Tag matched against agent capability sets.
    pub task_type: String,
    /// Higher priority is dispatched sooner; FIFO within a band.
    #[serde(default)]
    pub priority: i32,
    /// Opaque domain payload, passed through to the executor untouched.
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Optional execution deadline. `None` means no timeout.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl TaskDescriptor {
    /// Create a descriptor for the given task type with default priority
    /// and an empty payload.
    pub fn new(task_type: impl Into<String>) -> Self {
        Self {
            task_type: task_type.into(),
            priority: 0,
            payload: serde_json::Value::Null,
            timeout_ms: None,
        }
    }

    /// Set the dispatch priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Attach an opaque payload.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Set an execution deadline in milliseconds.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// A unit of schedulable work tracked by the workforce.
///
/// A task lives in exactly one of the queue or the processing set; once
/// terminal it is retained only in the bounded finished history and the
/// aggregate counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique, immutable identifier.
    pub id: TaskId,
    /// Tag matched against agent capability sets.
    pub task_type: String,
    /// Higher priority is dispatched sooner.
    pub priority: i32,
    /// Opaque domain payload.
    pub payload: serde_json::Value,
    /// Current pipeline status.
    pub status: TaskStatus,
    /// Opaque result, set on completion.
    pub result: Option<serde_json::Value>,
    /// Executor-reported numeric value; reporting only, never scheduling.
    pub reported_value: Option<f64>,
    /// Failure description, set when the task fails.
    pub error: Option<String>,
    /// Agent the task was dispatched to.
    pub assigned_agent: Option<AgentId>,
    /// When the task was accepted into the queue.
    pub submitted_at: DateTime<Utc>,
    /// When the task was assigned and execution began.
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
    /// Dispatch cycles that found no capable agent for this task.
    #[serde(default)]
    pub dispatch_attempts: u32,
    /// Optional execution deadline in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl Task {
    /// Build a fresh queued task from a caller-supplied descriptor.
    pub fn from_descriptor(descriptor: TaskDescriptor) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_type: descriptor.task_type,
            priority: descriptor.priority,
            payload: descriptor.payload,
            status: TaskStatus::Queued,
            result: None,
            reported_value: None,
            error: None,
            assigned_agent: None,
            submitted_at: Utc::now(),
            started_at: None,
            completed_at: None,
            dispatch_attempts: 0,
            timeout_ms: descriptor.timeout_ms,
        }
    }

    /// Whether the task has reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Milliseconds the task has spent since submission.
    pub fn age_ms(&self) -> u64 {
        let age = Utc::now().signed_duration_since(self.submitted_at);
        age.num_milliseconds().max(0) as u64
    }
}
