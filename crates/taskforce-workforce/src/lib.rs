//! Task-dispatch and workforce-scaling engine.
//!
//! A bounded task queue serviced by a pool of long-lived agents, with
//! configurable load balancing, automatic pool scaling, and per-agent
//! performance tracking feeding assignment and retirement decisions.
//! Task payloads and results are opaque to this crate.
//!
//! # Main types
//!
//! - [`WorkforceManager`] — Façade owning the queue, the agent pool, and
//!   the periodic dispatch/scale/health loops.
//! - [`TaskQueue`] — Bounded priority queue of pending tasks.
//! - [`Dispatcher`] — Matches tasks to capable, available agents.
//! - [`AutoScaler`] — Grows and shrinks the pool from load and queue depth.
//! - [`HealthMonitor`] — Flags and retires chronically underperforming agents.
//! - [`StateStore`] — Narrow persistence hook for workforce state.
//! - [`WorkforceConfig`] / [`WorkforceMetrics`] — Configuration and the
//!   derived point-in-time metrics view.

/// Agent selection strategies.
pub mod dispatcher;
/// Underperformance detection.
pub mod health;
/// The workforce manager façade and its periodic loops.
pub mod manager;
/// Pool-size decisions from load and queue depth.
pub mod scaler;
/// Optional persistence of workforce state.
pub mod state;
/// Bounded priority queue of pending tasks.
pub mod task_queue;
/// Configuration and derived metrics.
pub mod types;

pub use dispatcher::Dispatcher;
pub use health::{HealthMonitor, HealthVerdict};
pub use manager::WorkforceManager;
pub use scaler::{AutoScaler, ScalingContext, ScalingDecision};
pub use state::{AgentRecord, JsonFileStateStore, StateStore};
pub use task_queue::{QueuedTask, TaskQueue};
pub use types::{LoadBalancingStrategy, WorkforceConfig, WorkforceMetrics};
