//! Orchestration integration tests
//!
//! Drives the controller end to end with scripted test runs and mock specialists.

use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dispatchr::classifier;
use dispatchr::controller::{Controller, ControllerConfig, EngineConfig};
use dispatchr::coordination;
use dispatchr::domain::{
    ControllerState, DomainId, DomainSignature, FailureRecord, MatchRule, OrchestrationStatus, Task, WorkerResult,
};
use dispatchr::error::Result;
use dispatchr::executor::Executor;
use dispatchr::planner::{self, PlannerConfig};
use dispatchr::registry::Registry;
use dispatchr::test_run::TestRunSource;
use dispatchr::worker::WorkerInvoker;

/// Replays scripted reports in order; the last one repeats forever.
struct ScriptedRun {
    reports: Mutex<VecDeque<Vec<FailureRecord>>>,
}

impl ScriptedRun {
    fn new(reports: Vec<Vec<FailureRecord>>) -> Self {
        Self {
            reports: Mutex::new(reports.into()),
        }
    }
}

#[async_trait]
impl TestRunSource for ScriptedRun {
    async fn collect(&self) -> Result<Vec<FailureRecord>> {
        let mut reports = self.reports.lock().unwrap();
        if reports.len() > 1 {
            Ok(reports.pop_front().unwrap())
        } else {
            Ok(reports.front().cloned().unwrap_or_default())
        }
    }
}

/// Specialist that sleeps, tracks overlap and can be told to time out per domain.
struct MockSpecialist {
    delay: Duration,
    timeout_domains: BTreeSet<String>,
    current: AtomicUsize,
    max_seen: AtomicUsize,
    calls: Mutex<Vec<DomainId>>,
}

impl MockSpecialist {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            timeout_domains: BTreeSet::new(),
            current: AtomicUsize::new(0),
            max_seen: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn timing_out(mut self, domain: &str) -> Self {
        self.timeout_domains.insert(domain.to_string());
        self
    }

    fn calls(&self) -> Vec<DomainId> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkerInvoker for MockSpecialist {
    async fn invoke(&self, task: &Task, timeout: Duration) -> WorkerResult {
        self.calls.lock().unwrap().push(task.domain.clone());
        if self.timeout_domains.contains(task.domain.as_str()) {
            return WorkerResult::timed_out(task.domain.clone(), timeout);
        }
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_seen.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        WorkerResult::completed(task.domain.clone(), Some(0), "fixed", self.delay)
    }
}

fn registry() -> Arc<Registry> {
    Arc::new(
        Registry::new(
            vec![
                DomainSignature::new("auth", "backend/auth", "Authentication")
                    .with_rule(MatchRule::new(r"\b401\b|unauthorized|token", 1.0)),
                DomainSignature::new("ui", "frontend/ui", "User interface")
                    .with_rule(MatchRule::new(r"button|click", 1.0)),
                DomainSignature::new("x", "services/x", "Slow service").with_rule(MatchRule::new(r"x-service", 1.0)),
            ],
            None,
        )
        .unwrap(),
    )
}

fn engine(max_cycles: u32, max_concurrency: usize) -> ControllerConfig {
    ControllerConfig::new(EngineConfig {
        max_cycles,
        max_concurrency,
        min_confidence: 0.0,
    })
}

fn auth_failures() -> Vec<FailureRecord> {
    vec![
        FailureRecord::new("login_rejects_bad_password", "expected 200 got 401"),
        FailureRecord::new("refresh_token", "token expired"),
        FailureRecord::new("admin_route", "unauthorized"),
    ]
}

fn ui_failures() -> Vec<FailureRecord> {
    vec![
        FailureRecord::new("submit_form", "button not found"),
        FailureRecord::new("menu_opens", "click had no effect"),
    ]
}

#[tokio::test]
async fn test_two_domains_fixed_in_one_cycle() {
    let initial: Vec<FailureRecord> = auth_failures().into_iter().chain(ui_failures()).collect();
    let run = ScriptedRun::new(vec![initial.clone(), vec![]]);
    let specialist = Arc::new(MockSpecialist::new(Duration::from_millis(100)));
    let executor = Executor::new(specialist.clone(), Duration::from_secs(5));
    let reg = registry();

    // Classifier and planner view of the same input
    let classification = classifier::classify(&initial, &reg, 0.0);
    assert_eq!(classification.groups.len(), 2);
    assert_eq!(classification.groups[&DomainId::new("auth")].failures.len(), 3);
    assert_eq!(classification.groups[&DomainId::new("ui")].failures.len(), 2);
    assert_eq!(planner::plan(&classification, &PlannerConfig::default()).len(), 2);

    let mut controller = Controller::new(engine(3, 2), reg, run, executor);
    let outcome = controller.run().await.unwrap();

    assert_eq!(outcome.status, OrchestrationStatus::Done);
    assert_eq!(outcome.cycles(), 1);
    assert_eq!(specialist.max_seen.load(Ordering::SeqCst), 2);

    let report = &outcome.history[0];
    assert_eq!(report.classified.len(), 5);
    assert!(report.unclassified.is_empty());
    assert_eq!(report.task_results.len(), 2);
    assert!(report.task_results.iter().all(|r| r.success));
    assert_eq!(report.remaining_failure_count, 0);
}

#[tokio::test]
async fn test_unmatched_failure_is_reported_unclassified() {
    let mystery = FailureRecord::new("flaky", "segmentation fault in native code");
    let run = ScriptedRun::new(vec![vec![mystery.clone()]]);
    let specialist = Arc::new(MockSpecialist::new(Duration::ZERO));
    let executor = Executor::new(specialist.clone(), Duration::from_secs(5));

    let mut controller = Controller::new(engine(1, 2), registry(), run, executor);
    let outcome = controller.run().await.unwrap();

    let report = &outcome.history[0];
    assert!(report.classified.is_empty());
    assert_eq!(report.unclassified.len(), 1);
    assert_eq!(report.unclassified[0].record, mystery);
    assert!(report.unclassified[0].domain.is_none());
    assert!(report.task_results.is_empty());
    assert!(specialist.calls().is_empty());
}

#[tokio::test]
async fn test_timing_out_domain_exhausts_cycle_budget() {
    let stuck = vec![FailureRecord::new("x_health", "x-service did not respond")];
    let run = ScriptedRun::new(vec![stuck]);
    let specialist = Arc::new(MockSpecialist::new(Duration::ZERO).timing_out("x"));
    let executor = Executor::new(specialist.clone(), Duration::from_millis(50));

    let mut controller = Controller::new(engine(4, 2), registry(), run, executor);
    let outcome = controller.run().await.unwrap();

    assert_eq!(outcome.status, OrchestrationStatus::FailedMaxCycles);
    assert_eq!(outcome.cycles(), 4);
    assert_eq!(specialist.calls(), vec![DomainId::new("x"); 4]);
    for report in &outcome.history {
        assert_eq!(report.classified.len(), 1);
        assert_eq!(report.classified[0].domain, Some(DomainId::new("x")));
        assert!(report.task_results[0].timed_out);
        assert!(!report.task_results[0].success);
    }
}

#[tokio::test]
async fn test_partner_domains_get_one_directive() {
    let reg = Registry::builtin().unwrap();
    let dispatched: BTreeSet<DomainId> = ["auth-frontend", "auth-backend"].into_iter().map(DomainId::new).collect();

    let directives = coordination::analyze(&dispatched, &reg);

    assert_eq!(directives.len(), 1);
    assert_eq!(directives[0].domains, dispatched);
}

#[tokio::test]
async fn test_partner_directive_recorded_in_cycle() {
    let failures = vec![
        FailureRecord::new("login_page", "login form did not submit"),
        FailureRecord::new("token_endpoint", "expected 200 got 401 unauthorized"),
    ];
    let run = ScriptedRun::new(vec![failures, vec![]]);
    let executor = Executor::new(Arc::new(MockSpecialist::new(Duration::ZERO)), Duration::from_secs(5));

    let mut controller = Controller::new(engine(2, 4), Arc::new(Registry::builtin().unwrap()), run, executor);
    let outcome = controller.run().await.unwrap();

    let report = &outcome.history[0];
    assert_eq!(report.dispatched_domains().len(), 2);
    assert_eq!(report.directives.len(), 1);
}

#[tokio::test]
async fn test_concurrency_cap_holds_across_cycle() {
    let domains: Vec<String> = (0..8).map(|i| format!("d{}", i)).collect();
    let signatures = domains
        .iter()
        .map(|d| DomainSignature::new(d.as_str(), format!("svc/{}", d), d.as_str()).with_rule(MatchRule::new(format!(r"\b{}\b", d), 1.0)))
        .collect();
    let reg = Arc::new(Registry::new(signatures, None).unwrap());
    let failures = domains.iter().map(|d| FailureRecord::new(d.as_str(), format!("{} broke", d))).collect();

    let specialist = Arc::new(MockSpecialist::new(Duration::from_millis(40)));
    let executor = Executor::new(specialist.clone(), Duration::from_secs(5));
    let mut controller = Controller::new(engine(1, 3), reg, ScriptedRun::new(vec![failures, vec![]]), executor);
    let outcome = controller.run().await.unwrap();

    assert!(outcome.is_done());
    assert_eq!(outcome.history[0].task_results.len(), 8);
    assert!(specialist.max_seen.load(Ordering::SeqCst) <= 3);
    assert!(controller.executor().peak_running() <= 3);
}

#[tokio::test]
async fn test_parallel_batch_takes_about_one_task_duration() {
    let delay = Duration::from_millis(300);
    let specialist = Arc::new(MockSpecialist::new(delay));
    let executor = Executor::new(specialist, Duration::from_secs(5));
    let tasks: Vec<Task> = ["a", "b", "c", "d"]
        .into_iter()
        .map(|d| Task {
            domain: d.into(),
            failures: Vec::new(),
            priority: Default::default(),
            estimated_duration: delay,
        })
        .collect();

    let start = Instant::now();
    let results = executor.execute(tasks, 4).await;
    let elapsed = start.elapsed();

    assert_eq!(results.len(), 4);
    assert!(elapsed >= delay);
    assert!(elapsed < delay * 3, "batch took {:?}", elapsed);
}

#[tokio::test]
async fn test_never_resolving_specialist_still_terminates() {
    let run = ScriptedRun::new(vec![auth_failures()]);
    let specialist = Arc::new(MockSpecialist::new(Duration::ZERO).timing_out("auth"));
    let executor = Executor::new(specialist, Duration::from_millis(10));

    let mut controller = Controller::new(engine(2, 1), registry(), run, executor);
    let outcome = controller.run().await.unwrap();

    assert_eq!(outcome.status, OrchestrationStatus::FailedMaxCycles);
    assert_eq!(outcome.cycles(), 2);
    assert_eq!(
        outcome.transitions.iter().filter(|s| **s == ControllerState::Classifying).count(),
        2
    );
}

#[tokio::test]
async fn test_clean_run_is_a_noop_every_time() {
    for _ in 0..2 {
        let specialist = Arc::new(MockSpecialist::new(Duration::ZERO));
        let executor = Executor::new(specialist.clone(), Duration::from_secs(5));
        let mut controller = Controller::new(engine(3, 2), registry(), ScriptedRun::new(vec![vec![]]), executor);
        let outcome = controller.run().await.unwrap();

        assert!(outcome.is_done());
        assert_eq!(outcome.cycles(), 1);
        assert!(outcome.history[0].classified.is_empty());
        assert!(outcome.history[0].task_results.is_empty());
        assert!(specialist.calls().is_empty());
    }
}

#[tokio::test]
async fn test_classification_is_deterministic() {
    let reg = registry();
    let records: Vec<FailureRecord> = auth_failures().into_iter().chain(ui_failures()).collect();
    let first = classifier::classify(&records, &reg, 0.0);
    let second = classifier::classify(&records, &reg, 0.0);
    assert_eq!(first, second);
    assert_eq!(first.total(), records.len());
}
