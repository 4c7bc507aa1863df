//! Agent abstraction for the Taskforce engine.
//!
//! An agent is a stateful unit of work capacity: a declared kind, a
//! capability set, a concurrency ceiling, and rolling performance
//! statistics. The engine dispatches tasks to agents; the domain logic
//! behind each execution lives behind the [`TaskExecutor`] boundary.
//!
//! # Main types
//!
//! - [`Agent`] — Trait every worker variant implements.
//! - [`AgentCore`] — Shared bookkeeping embedded by every variant.
//! - [`AgentKind`] — Fixed enumeration of worker specializations.
//! - [`AgentConfig`] — Static per-agent configuration.
//! - [`AgentFactory`] — Registered-builder map; new kinds plug in without
//!   touching the dispatcher.
//! - [`TaskExecutor`] — Domain-specific execution boundary, one per kind.
//! - [`PerformanceTracker`] — Per-agent rolling statistics.

/// Agent trait and shared bookkeeping core.
pub mod agent;
/// Agent kinds and static configuration.
pub mod config;
/// Domain execution boundary.
pub mod executor;
/// Registered agent builders.
pub mod factory;
/// Built-in agent variants.
pub mod kinds;
/// Rolling per-agent performance statistics.
pub mod performance;

pub use agent::{Agent, AgentCore};
pub use config::{AgentConfig, AgentConfigUpdate, AgentKind};
pub use executor::{ExecutionOutput, TaskExecutor};
pub use factory::{default_factory, AgentBuilder, AgentFactory};
pub use kinds::{MarketAgent, RevenueAgent};
pub use performance::{AgentPerformance, PerformanceTracker};
