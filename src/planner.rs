//! Execution Planner.
//!
//! Turns grouped failures into dispatchable tasks with cost estimates.
//!
//! Cost model: `base_duration(domain) + per_failure_overhead * failure_count`.
//! The constants are uncalibrated heuristics kept in configuration; the estimates
//! are for reporting and must not be read as measured remediation time.
//!
//! Tasks are sorted by priority (highest first) for reporting only. The executor
//! treats every task as eligible for concurrent dispatch regardless of this order.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classifier::Classification;
use crate::domain::{DomainId, Task};

/// Heuristic cost constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PlannerConfig {
    /// Base duration for domains without an explicit entry
    pub default_base_duration_ms: u64,
    /// Added per failure in the task
    pub per_failure_overhead_ms: u64,
    /// Per-domain base durations
    pub base_duration_ms: HashMap<String, u64>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            default_base_duration_ms: 300_000, // 5 minutes
            per_failure_overhead_ms: 60_000,   // 1 minute
            base_duration_ms: HashMap::new(),
        }
    }
}

impl PlannerConfig {
    /// Set the base duration for one domain.
    pub fn with_base_duration(mut self, domain: impl Into<String>, ms: u64) -> Self {
        self.base_duration_ms.insert(domain.into(), ms);
        self
    }

    /// Set the per-failure overhead.
    pub fn with_per_failure_overhead(mut self, ms: u64) -> Self {
        self.per_failure_overhead_ms = ms;
        self
    }

    fn base_duration_ms(&self, domain: &DomainId) -> u64 {
        self.base_duration_ms
            .get(domain.as_str())
            .copied()
            .unwrap_or(self.default_base_duration_ms)
    }

    /// Estimated duration of a task for `domain` with `failure_count` failures.
    /// Saturates instead of overflowing on extreme configuration.
    pub fn estimate(&self, domain: &DomainId, failure_count: usize) -> Duration {
        let count = u64::try_from(failure_count).unwrap_or(u64::MAX);
        let overhead = self.per_failure_overhead_ms.saturating_mul(count);
        Duration::from_millis(self.base_duration_ms(domain).saturating_add(overhead))
    }
}

/// Build the task list for a classification. Pure function of its inputs.
pub fn plan(classification: &Classification, config: &PlannerConfig) -> Vec<Task> {
    let mut tasks: Vec<Task> = classification
        .groups
        .iter()
        .filter(|(_, group)| !group.failures.is_empty())
        .map(|(domain, group)| Task {
            domain: domain.clone(),
            failures: group.failures.clone(),
            priority: group.priority,
            estimated_duration: config.estimate(domain, group.failures.len()),
        })
        .collect();

    // Reporting order: priority descending, then domain id for stability
    tasks.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.domain.cmp(&b.domain)));

    for task in &tasks {
        log::debug!(
            "Planned task domain={} failures={} priority={} estimate={:?}",
            task.domain,
            task.failure_count(),
            task.priority,
            task.estimated_duration
        );
    }

    tasks
}

/// Sum of estimated durations; the serial upper bound for a batch.
pub fn total_estimate(tasks: &[Task]) -> Duration {
    tasks.iter().map(|t| t.estimated_duration).sum()
}
