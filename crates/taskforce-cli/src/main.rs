use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use taskforce_agent::{
    default_factory, AgentConfig, AgentKind, ExecutionOutput, TaskExecutor,
};
use taskforce_core::{Task, TaskDescriptor, TaskforceError, TaskforceResult};
use taskforce_workforce::{JsonFileStateStore, StateStore, WorkforceConfig, WorkforceManager};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "taskforce", about = "Taskforce — agent workforce engine")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "taskforce.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulated workload against a real workforce
    Run {
        /// Seconds to run before draining
        #[arg(long, default_value_t = 30)]
        duration: u64,
        /// Tasks submitted per second
        #[arg(long, default_value_t = 5)]
        rate: u64,
    },
    /// Validate the config file and print the resolved workforce shape
    Check,
}

#[derive(Deserialize, Default)]
struct CliConfig {
    #[serde(default)]
    workforce: WorkforceConfig,
    /// When set, workforce state survives restarts in this JSON file.
    #[serde(default)]
    state_file: Option<PathBuf>,
    #[serde(default)]
    simulation: SimulationConfig,
}

#[derive(Deserialize)]
struct SimulationConfig {
    #[serde(default = "default_base_latency")]
    base_latency_ms: u64,
    #[serde(default = "default_failure_rate")]
    failure_rate: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            base_latency_ms: default_base_latency(),
            failure_rate: default_failure_rate(),
        }
    }
}

fn default_base_latency() -> u64 {
    120
}
fn default_failure_rate() -> f64 {
    0.1
}

/// Executor standing in for domain logic: jittered latency, a configured
/// failure rate, and a reported value scaled by the agent's risk knob.
struct SimulatedExecutor {
    base_latency_ms: u64,
    failure_rate: f64,
}

#[async_trait::async_trait]
impl TaskExecutor for SimulatedExecutor {
    async fn run(&self, task: &Task, config: &AgentConfig) -> TaskforceResult<ExecutionOutput> {
        let jitter = fastrand::u64(0..=self.base_latency_ms.max(1) / 2);
        tokio::time::sleep(Duration::from_millis(self.base_latency_ms + jitter)).await;
        if fastrand::f64() < self.failure_rate {
            return Err(TaskforceError::Execution(format!(
                "simulated failure on '{}'",
                task.task_type
            )));
        }
        let value = fastrand::f64() * 100.0 * config.risk_tolerance;
        Ok(ExecutionOutput::new(serde_json::json!({
            "task_type": task.task_type,
            "worker": config.name,
        }))
        .with_value(value))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config).await?;

    match cli.command {
        Commands::Run { duration, rate } => run(config, duration, rate).await,
        Commands::Check => check(config),
    }
}

async fn load_config(path: &PathBuf) -> anyhow::Result<CliConfig> {
    if !path.exists() {
        info!(path = %path.display(), "config file not found, using defaults");
        return Ok(CliConfig::default());
    }
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow::anyhow!("failed to read config file '{}': {}", path.display(), e))?;
    Ok(toml::from_str(&raw)?)
}

async fn run(config: CliConfig, duration: u64, rate: u64) -> anyhow::Result<()> {
    let executor = Arc::new(SimulatedExecutor {
        base_latency_ms: config.simulation.base_latency_ms,
        failure_rate: config.simulation.failure_rate,
    });
    let mut factory = default_factory();
    for kind in AgentKind::ALL {
        if factory.is_registered(kind) {
            factory.register_executor(kind, Arc::clone(&executor) as Arc<dyn TaskExecutor>);
        }
    }

    let store = config
        .state_file
        .as_ref()
        .map(|path| Arc::new(JsonFileStateStore::new(path.clone())) as Arc<dyn StateStore>);
    let manager = Arc::new(WorkforceManager::with_store(
        config.workforce,
        factory,
        store,
    ));
    manager.initialize().await?;
    manager.start().await;

    // every task type the configured kinds can serve, cycled round-robin
    let task_types: Vec<String> = manager
        .config()
        .agent_kinds
        .iter()
        .flat_map(|kind| kind.default_capabilities())
        .collect();
    info!(
        duration,
        rate,
        types = task_types.len(),
        "submitting simulated workload"
    );

    let mut submitted: u64 = 0;
    let mut rejected: u64 = 0;
    let submit_period = (1_000 / rate.max(1)).max(1);
    let mut submit_tick = tokio::time::interval(Duration::from_millis(submit_period));
    let mut report_tick = tokio::time::interval(Duration::from_secs(5));
    let deadline = tokio::time::Instant::now() + Duration::from_secs(duration);

    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => break,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, draining");
                break;
            }
            _ = submit_tick.tick() => {
                let task_type = &task_types[submitted as usize % task_types.len()];
                let descriptor = TaskDescriptor::new(task_type)
                    .with_priority(fastrand::i32(0..10));
                match manager.submit_task(descriptor).await {
                    Ok(_) => submitted += 1,
                    Err(TaskforceError::QueueFull(capacity)) => {
                        rejected += 1;
                        warn!(capacity, "queue full, task rejected");
                    }
                    Err(e) => warn!(error = %e, "submission failed"),
                }
            }
            _ = report_tick.tick() => {
                report(&manager).await;
            }
        }
    }

    manager.stop().await;

    let metrics = manager.metrics().await;
    println!("--- workload summary ---");
    println!("submitted:        {submitted}");
    println!("rejected:         {rejected}");
    println!("processed:        {}", metrics.total_tasks_processed);
    println!("avg completion:   {:.0} ms", metrics.average_completion_ms);
    println!("pool efficiency:  {:.2}", metrics.overall_efficiency);
    println!("final pool size:  {}", metrics.total_agents);
    let total_value: f64 = manager
        .all_agent_performance()
        .await
        .iter()
        .map(|performance| performance.total_reported_value)
        .sum();
    println!("reported value:   {total_value:.2}");
    Ok(())
}

async fn report(manager: &Arc<WorkforceManager>) {
    let metrics = manager.metrics().await;
    info!(
        agents = metrics.total_agents,
        active = metrics.active_agents,
        queued = metrics.queue_length,
        processed = metrics.total_tasks_processed,
        load = format!("{:.2}", metrics.system_load),
        efficiency = format!("{:.2}", metrics.overall_efficiency),
        "workforce status"
    );
}

fn check(config: CliConfig) -> anyhow::Result<()> {
    let workforce = &config.workforce;
    if workforce.agent_kinds.is_empty() {
        anyhow::bail!("workforce.agent_kinds must not be empty");
    }
    if workforce.min_agents == 0 || workforce.min_agents > workforce.max_agents {
        anyhow::bail!(
            "workforce.min_agents must be in [1, max_agents], got {}",
            workforce.min_agents
        );
    }

    println!("config OK");
    println!("  agents:          {} initial, {}..{} bounds", workforce.initial_agents, workforce.min_agents, workforce.max_agents);
    println!("  kinds:           {}", workforce
        .agent_kinds
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", "));
    println!("  queue capacity:  {}", workforce.task_queue_size);
    println!("  load balancing:  {:?}", workforce.load_balancing);
    println!("  auto scaling:    {}", workforce.auto_scaling);
    println!(
        "  intervals:       dispatch {}ms / scale {}ms / health {}ms",
        workforce.dispatch_interval_ms, workforce.scale_interval_ms, workforce.health_interval_ms
    );
    if let Some(state_file) = &config.state_file {
        println!("  state file:      {}", state_file.display());
    }
    Ok(())
}
