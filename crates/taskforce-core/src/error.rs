use uuid::Uuid;

/// A convenience `Result` alias using [`TaskforceError`].
pub type TaskforceResult<T> = Result<T, TaskforceError>;

/// Top-level error type for the Taskforce engine.
///
/// Queue and capacity errors are returned synchronously to the caller;
/// execution errors are recorded on the task record and never propagated
/// back into the dispatch loop.
#[derive(Debug, thiserror::Error)]
pub enum TaskforceError {
    /// The task queue is at capacity; the submission was rejected.
    #[error("task queue is full (capacity {0})")]
    QueueFull(usize),

    /// An agent was asked to take a task while at its concurrency ceiling.
    /// With correct dispatch logic this never surfaces to callers.
    #[error("agent {0} is at capacity")]
    AgentAtCapacity(Uuid),

    /// No agent in the pool can serve the given task type.
    #[error("no capable agent for task type '{0}'")]
    NoCapableAgent(String),

    /// A domain executor failed or its deadline elapsed.
    #[error("task execution failed: {0}")]
    Execution(String),

    /// The agent was retired while the task was still in flight.
    #[error("agent {0} retired with the task in flight")]
    AgentRetired(Uuid),

    /// An error in configuration parsing or validation.
    #[error("config error: {0}")]
    Config(String),

    /// An error from the external state store.
    #[error("state store error: {0}")]
    State(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_full_message() {
        let err = TaskforceError::QueueFull(100);
        assert_eq!(err.to_string(), "task queue is full (capacity 100)");
    }

    #[test]
    fn test_no_capable_agent_names_task_type() {
        let err = TaskforceError::NoCapableAgent("market_analysis".to_string());
        assert!(err.to_string().contains("market_analysis"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: TaskforceError = json_err.into();
        assert!(matches!(err, TaskforceError::Json(_)));
    }
}
