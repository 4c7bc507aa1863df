use taskforce_agent::AgentPerformance;

/// Settled attempts required before performance is judged. Judged on
/// attempts rather than completions so an agent failing everything still
/// accumulates a sample.
const MIN_SAMPLES: u64 = 10;

/// Success rate below which an agent is force-retired.
const RETIRE_FLOOR: f64 = 0.5;

/// Outcome of one health assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthVerdict {
    /// Performing acceptably, or too few samples to judge.
    Healthy,
    /// Below the configured threshold; logged, not retired.
    Underperforming,
    /// Below the hard floor; retire and replace.
    Retire,
}

/// Flags chronically underperforming agents for warning or retirement.
pub struct HealthMonitor {
    performance_threshold: f64,
}

impl HealthMonitor {
    /// Monitor with the given warning-band threshold.
    pub fn new(performance_threshold: f64) -> Self {
        Self {
            performance_threshold,
        }
    }

    /// Judge an agent's current statistics.
    pub fn assess(&self, performance: &AgentPerformance) -> HealthVerdict {
        let attempts = performance.tasks_completed + performance.tasks_failed;
        if attempts <= MIN_SAMPLES {
            return HealthVerdict::Healthy;
        }
        if performance.success_rate < RETIRE_FLOOR {
            HealthVerdict::Retire
        } else if performance.success_rate < self.performance_threshold {
            HealthVerdict::Underperforming
        } else {
            HealthVerdict::Healthy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn performance(completed: u64, failed: u64) -> AgentPerformance {
        let attempts = completed + failed;
        let success_rate = if attempts == 0 {
            1.0
        } else {
            completed as f64 / attempts as f64
        };
        AgentPerformance {
            agent_id: Uuid::new_v4(),
            tasks_completed: completed,
            tasks_failed: failed,
            success_rate,
            average_execution_ms: 100.0,
            efficiency: success_rate,
            total_reported_value: 0.0,
        }
    }

    #[test]
    fn test_too_few_samples_is_healthy() {
        let monitor = HealthMonitor::new(0.7);
        // failing badly, but only 5 attempts
        assert_eq!(monitor.assess(&performance(1, 4)), HealthVerdict::Healthy);
    }

    #[test]
    fn test_chronic_failure_retires() {
        let monitor = HealthMonitor::new(0.7);
        // 20 completions at a 0.3 success rate
        assert_eq!(monitor.assess(&performance(20, 47)), HealthVerdict::Retire);
    }

    #[test]
    fn test_warning_band_does_not_retire() {
        let monitor = HealthMonitor::new(0.7);
        // 0.6: below threshold, above the hard floor
        assert_eq!(
            monitor.assess(&performance(12, 8)),
            HealthVerdict::Underperforming
        );
    }

    #[test]
    fn test_good_agent_is_healthy() {
        let monitor = HealthMonitor::new(0.7);
        assert_eq!(monitor.assess(&performance(18, 2)), HealthVerdict::Healthy);
    }

    #[test]
    fn test_boundary_at_retire_floor() {
        let monitor = HealthMonitor::new(0.7);
        // exactly 0.5 stays in the warning band
        assert_eq!(
            monitor.assess(&performance(10, 10)),
            HealthVerdict::Underperforming
        );
    }
}
