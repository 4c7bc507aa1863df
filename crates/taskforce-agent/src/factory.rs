use crate::agent::{Agent, AgentCore};
use crate::config::{AgentConfig, AgentKind};
use crate::executor::TaskExecutor;
use crate::kinds::{MarketAgent, RevenueAgent};
use std::collections::HashMap;
use std::sync::Arc;
use taskforce_core::{TaskforceError, TaskforceResult};

/// Builder closure registered per agent kind.
pub type AgentBuilder =
    Arc<dyn Fn(AgentCore, Arc<dyn TaskExecutor>) -> Arc<dyn Agent> + Send + Sync>;

/// Registry mapping agent kinds to constructors and executors.
///
/// New kinds are added by registering a builder and an executor; the
/// dispatcher and the workforce manager never switch on kind themselves.
#[derive(Default)]
pub struct AgentFactory {
    builders: HashMap<AgentKind, AgentBuilder>,
    executors: HashMap<AgentKind, Arc<dyn TaskExecutor>>,
}

impl AgentFactory {
    /// Empty factory with nothing registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a builder for the given kind, replacing any previous one.
    pub fn register(&mut self, kind: AgentKind, builder: AgentBuilder) {
        self.builders.insert(kind, builder);
    }

    /// Register the domain executor for the given kind.
    pub fn register_executor(&mut self, kind: AgentKind, executor: Arc<dyn TaskExecutor>) {
        self.executors.insert(kind, executor);
    }

    /// Kinds with a registered builder.
    pub fn registered_kinds(&self) -> Vec<AgentKind> {
        AgentKind::ALL
            .iter()
            .copied()
            .filter(|kind| self.builders.contains_key(kind))
            .collect()
    }

    /// Whether a builder is registered for the kind.
    pub fn is_registered(&self, kind: AgentKind) -> bool {
        self.builders.contains_key(&kind)
    }

    /// Construct an agent around the given core.
    ///
    /// Fails with a config error when the core's kind has no registered
    /// builder or executor.
    pub fn build(&self, core: AgentCore) -> TaskforceResult<Arc<dyn Agent>> {
        let kind = core.kind();
        let builder = self.builders.get(&kind).ok_or_else(|| {
            TaskforceError::Config(format!("no builder registered for agent kind '{kind}'"))
        })?;
        let executor = self.executors.get(&kind).ok_or_else(|| {
            TaskforceError::Config(format!("no executor registered for agent kind '{kind}'"))
        })?;
        let agent = builder(core, Arc::clone(executor));
        agent.start();
        Ok(agent)
    }

    /// Construct a fresh agent from its configuration.
    pub fn spawn(&self, config: AgentConfig) -> TaskforceResult<Arc<dyn Agent>> {
        self.build(AgentCore::new(config))
    }
}

/// Factory with the built-in revenue and market builders registered.
/// Executors still have to be registered by the embedder.
pub fn default_factory() -> AgentFactory {
    let mut factory = AgentFactory::new();
    factory.register(
        AgentKind::Revenue,
        Arc::new(|core, executor| Arc::new(RevenueAgent::with_core(core, executor))),
    );
    factory.register(
        AgentKind::Market,
        Arc::new(|core, executor| Arc::new(MarketAgent::with_core(core, executor))),
    );
    factory
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::executor::ExecutionOutput;
    use async_trait::async_trait;
    use taskforce_core::Task;

    struct NullExecutor;

    #[async_trait]
    impl TaskExecutor for NullExecutor {
        async fn run(
            &self,
            _task: &Task,
            _config: &AgentConfig,
        ) -> TaskforceResult<ExecutionOutput> {
            Ok(ExecutionOutput::default())
        }
    }

    #[test]
    fn test_default_factory_registers_builtin_kinds() {
        let factory = default_factory();
        assert!(factory.is_registered(AgentKind::Revenue));
        assert!(factory.is_registered(AgentKind::Market));
        assert!(!factory.is_registered(AgentKind::Risk));
    }

    #[test]
    fn test_spawn_without_executor_fails() {
        let factory = default_factory();
        let config = AgentConfig::for_kind(AgentKind::Revenue, "revenue-0");
        let err = factory.spawn(config).unwrap_err();
        assert!(err.to_string().contains("no executor registered"));
    }

    #[test]
    fn test_spawn_unregistered_kind_fails() {
        let mut factory = default_factory();
        factory.register_executor(AgentKind::Risk, Arc::new(NullExecutor));
        let config = AgentConfig::for_kind(AgentKind::Risk, "risk-0");
        let err = factory.spawn(config).unwrap_err();
        assert!(err.to_string().contains("no builder registered"));
    }

    #[test]
    fn test_spawn_builds_configured_agent() {
        let mut factory = default_factory();
        factory.register_executor(AgentKind::Market, Arc::new(NullExecutor));
        let config = AgentConfig::for_kind(AgentKind::Market, "market-7");
        let agent = factory.spawn(config).unwrap();
        assert_eq!(agent.kind(), AgentKind::Market);
        assert_eq!(agent.name(), "market-7");
        assert!(agent.is_available());
    }

    #[test]
    fn test_new_kind_plugs_in_without_dispatcher_changes() {
        let mut factory = default_factory();
        // a custom kind reuses an existing variant shape
        factory.register(
            AgentKind::Optimization,
            Arc::new(|core, executor| Arc::new(RevenueAgent::with_core(core, executor))),
        );
        factory.register_executor(AgentKind::Optimization, Arc::new(NullExecutor));
        let agent = factory
            .spawn(AgentConfig::for_kind(AgentKind::Optimization, "opt-0"))
            .unwrap();
        assert_eq!(agent.kind(), AgentKind::Optimization);
    }
}
