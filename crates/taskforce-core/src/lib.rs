//! Core types and error definitions for the Taskforce engine.
//!
//! This crate provides the foundational types shared across all Taskforce
//! crates: the unified error enum and the task model that flows through the
//! queue, dispatcher, and agents.
//!
//! # Main types
//!
//! - [`TaskforceError`] — Unified error enum for all Taskforce subsystems.
//! - [`TaskforceResult`] — Convenience alias for `Result<T, TaskforceError>`.
//! - [`Task`] — A schedulable unit of work with priority and opaque payload.
//! - [`TaskDescriptor`] — What callers hand to `submit_task`.
//! - [`TaskStatus`] — Queue/processing/terminal state of a task.

/// Error types for the Taskforce engine.
pub mod error;
/// Task model: descriptors, records, and status.
pub mod task;

pub use error::{TaskforceError, TaskforceResult};
pub use task::{AgentId, Task, TaskDescriptor, TaskId, TaskStatus};
