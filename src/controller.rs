//! Orchestration Controller.
//!
//! Drives repeated classify → plan → execute → coordinate → verify cycles:
//!
//! ```text
//! Idle → Classifying → Planning → Executing → Coordinating → Verifying ─┬→ Done
//!             │                                                ▲       ├→ Idle (next cycle)
//!             └──────────── zero failures ─────────────────────┘       └→ FailedMaxCycles
//! ```
//!
//! Every cycle starts from a fresh test run and verifies with another fresh run.
//! Cycles are strictly sequential and the loop always ends in `Done` or
//! `FailedMaxCycles` within `max_cycles` cycles.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::classifier::{self, DEFAULT_MIN_CONFIDENCE};
use crate::coordination;
use crate::domain::{ControllerState, CycleReport, OrchestrationOutcome, OrchestrationStatus};
use crate::error::{DispatchError, Result};
use crate::executor::Executor;
use crate::planner::{self, PlannerConfig};
use crate::registry::Registry;
use crate::test_run::TestRunSource;
use crate::worker::WorkerInvoker;

/// Loop bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EngineConfig {
    pub max_cycles: u32,
    pub max_concurrency: usize,
    /// Confidence a domain must strictly exceed to claim a failure
    pub min_confidence: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_cycles: 3,
            max_concurrency: 4,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

/// Everything the controller needs besides its collaborators.
#[derive(Debug, Clone, Default)]
pub struct ControllerConfig {
    pub engine: EngineConfig,
    pub planner: PlannerConfig,
    /// Append each cycle report as a JSON line here
    pub report_path: Option<PathBuf>,
}

impl ControllerConfig {
    pub fn new(engine: EngineConfig) -> Self {
        Self {
            engine,
            ..Default::default()
        }
    }

    pub fn with_planner(mut self, planner: PlannerConfig) -> Self {
        self.planner = planner;
        self
    }

    pub fn with_report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_path = Some(path.into());
        self
    }
}

pub struct Controller<T: TestRunSource, W: WorkerInvoker + 'static> {
    config: ControllerConfig,
    registry: Arc<Registry>,
    test_run: T,
    executor: Executor<W>,
    state: ControllerState,
    transitions: Vec<ControllerState>,
}

impl<T: TestRunSource, W: WorkerInvoker + 'static> Controller<T, W> {
    pub fn new(config: ControllerConfig, registry: Arc<Registry>, test_run: T, executor: Executor<W>) -> Self {
        Self {
            config,
            registry,
            test_run,
            executor,
            state: ControllerState::Idle,
            transitions: vec![ControllerState::Idle],
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn executor(&self) -> &Executor<W> {
        &self.executor
    }

    fn transition(&mut self, next: ControllerState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(DispatchError::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        log::debug!("Controller {} -> {}", self.state, next);
        self.state = next;
        self.transitions.push(next);
        Ok(())
    }

    /// Drive cycles until the failures clear or the cycle budget runs out.
    ///
    /// Only test-run errors and report-file errors propagate; worker failures are
    /// carried in the cycle reports.
    pub async fn run(&mut self) -> Result<OrchestrationOutcome> {
        if self.state != ControllerState::Idle {
            return Err(DispatchError::InvalidTransition {
                from: self.state.to_string(),
                to: ControllerState::Classifying.to_string(),
            });
        }

        let max_cycles = self.config.engine.max_cycles.max(1);
        let mut history = Vec::new();

        for cycle_index in 1..=max_cycles {
            let report = self.run_cycle(cycle_index).await?;
            self.write_report(&report)?;
            let remaining = report.remaining_failure_count;
            history.push(report);

            if remaining == 0 {
                self.transition(ControllerState::Done)?;
                log::info!("All failures cleared after {} cycle(s)", cycle_index);
                break;
            }
            if cycle_index == max_cycles {
                self.transition(ControllerState::FailedMaxCycles)?;
                log::warn!("{} failure(s) remain after {} cycle(s)", remaining, max_cycles);
                break;
            }
            self.transition(ControllerState::Idle)?;
        }

        let status = match self.state {
            ControllerState::Done => OrchestrationStatus::Done,
            _ => OrchestrationStatus::FailedMaxCycles,
        };

        Ok(OrchestrationOutcome {
            status,
            history,
            transitions: self.transitions.clone(),
        })
    }

    /// One cycle, ending in `Verifying`.
    async fn run_cycle(&mut self, cycle_index: u32) -> Result<CycleReport> {
        let mut report = CycleReport::new(cycle_index);
        log::info!("Cycle {} starting", cycle_index);

        self.transition(ControllerState::Classifying)?;
        let records = self.test_run.collect().await?;
        if records.is_empty() {
            log::info!("Cycle {}: test run reports no failures", cycle_index);
            self.transition(ControllerState::Verifying)?;
            return Ok(report);
        }

        let classification = classifier::classify(&records, &self.registry, self.config.engine.min_confidence);
        report.classified = classification.classified();
        report.unclassified = classification.unclassified.clone();
        log::info!(
            "Cycle {}: {} failures, {} classified into {} domain(s), {} unclassified",
            cycle_index,
            classification.total(),
            classification.classified_count(),
            classification.groups.len(),
            classification.unclassified.len()
        );

        self.transition(ControllerState::Planning)?;
        let tasks = planner::plan(&classification, &self.config.planner);

        self.transition(ControllerState::Executing)?;
        report.task_results = self
            .executor
            .execute(tasks, self.config.engine.max_concurrency)
            .await;

        self.transition(ControllerState::Coordinating)?;
        report.directives = coordination::analyze(&report.dispatched_domains(), &self.registry);

        self.transition(ControllerState::Verifying)?;
        let remaining = self.test_run.collect().await?;
        report.remaining_failure_count = remaining.len();
        log::info!(
            "Cycle {} verified: {} task(s) run, {} succeeded, {} failure(s) remain",
            cycle_index,
            report.task_results.len(),
            report.task_results.iter().filter(|r| r.success).count(),
            report.remaining_failure_count
        );

        Ok(report)
    }

    fn write_report(&self, report: &CycleReport) -> Result<()> {
        let Some(path) = &self.config.report_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let line = serde_json::to_string(report)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}
