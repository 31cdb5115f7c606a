//! Per-cycle reports and the overall orchestration outcome.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::failure::ClassifiedFailure;
use super::signature::DomainId;
use super::state::ControllerState;
use super::task::WorkerResult;

/// Informational note that two dispatched domains share concerns.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CoordinationDirective {
    pub domains: BTreeSet<DomainId>,
    pub concern: String,
}

/// Everything that happened in one classify → verify pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    /// 1-based cycle number
    pub cycle_index: u32,
    pub started_at: DateTime<Utc>,
    pub classified: Vec<ClassifiedFailure>,
    pub unclassified: Vec<ClassifiedFailure>,
    pub task_results: Vec<WorkerResult>,
    pub directives: Vec<CoordinationDirective>,
    /// Failures reported by the verification run
    pub remaining_failure_count: usize,
}

impl CycleReport {
    pub fn new(cycle_index: u32) -> Self {
        Self {
            cycle_index,
            started_at: Utc::now(),
            classified: Vec::new(),
            unclassified: Vec::new(),
            task_results: Vec::new(),
            directives: Vec::new(),
            remaining_failure_count: 0,
        }
    }

    /// Domains that were dispatched in this cycle.
    pub fn dispatched_domains(&self) -> BTreeSet<DomainId> {
        self.task_results.iter().map(|r| r.domain.clone()).collect()
    }

    /// Number of records seen at the start of the cycle.
    pub fn input_count(&self) -> usize {
        self.classified.len() + self.unclassified.len()
    }
}

/// Terminal status of an orchestration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationStatus {
    Done,
    FailedMaxCycles,
}

/// Result of driving the controller to a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationOutcome {
    pub status: OrchestrationStatus,
    pub history: Vec<CycleReport>,
    /// Every state the controller passed through, in order
    pub transitions: Vec<ControllerState>,
}

impl OrchestrationOutcome {
    pub fn cycles(&self) -> usize {
        self.history.len()
    }

    pub fn is_done(&self) -> bool {
        self.status == OrchestrationStatus::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::failure::FailureRecord;
    use std::time::Duration;

    #[test]
    fn test_cycle_report_counts() {
        let mut report = CycleReport::new(1);
        report.classified.push(ClassifiedFailure {
            record: FailureRecord::new("a", "401"),
            domain: Some("auth-backend".into()),
            confidence: 1.0,
            escalation: None,
        });
        report.unclassified.push(ClassifiedFailure {
            record: FailureRecord::new("b", "???"),
            domain: None,
            confidence: 0.0,
            escalation: None,
        });
        report
            .task_results
            .push(WorkerResult::failed("auth-backend".into(), "x", Duration::ZERO));

        assert_eq!(report.input_count(), 2);
        assert_eq!(report.dispatched_domains().len(), 1);
    }

    #[test]
    fn test_report_serializes() {
        let report = CycleReport::new(3);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"cycle_index\":3"));
        assert!(json.contains("remaining_failure_count"));
    }
}
