//! Bounded Concurrency Executor.
//!
//! Runs a batch of tasks against a worker invoker with at most `max_concurrency`
//! invocations in flight:
//! 1. Every task is spawned immediately and waits on a counting semaphore
//! 2. A task starts as soon as a permit is free and releases it the moment it ends
//! 3. Finished tasks report back over a channel
//! 4. The call returns once every task has resolved (full-batch barrier)
//!
//! Scheduling is continuous, not fixed-size batches. A failing, timed-out or
//! panicking task becomes a `WorkerResult { success: false }` and never affects
//! its siblings. Exactly one result comes back per task, in input order.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::{Semaphore, mpsc};

use crate::domain::{Task, WorkerResult};
use crate::worker::WorkerInvoker;

/// Extra time an invoker gets past its own timeout before the executor gives up on it.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(2);

/// Completion message sent from a finished task back to the executor.
#[derive(Debug)]
struct Completion {
    index: usize,
    result: WorkerResult,
}

/// Counts a task as running for as long as it is alive, unwinding included.
struct RunningGuard(Arc<AtomicUsize>);

impl RunningGuard {
    /// Mark one more task running and return the new count.
    fn enter(running: &Arc<AtomicUsize>) -> (Self, usize) {
        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
        (Self(running.clone()), now)
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Runs tasks on a capacity-limited pool of worker invocations.
pub struct Executor<W: WorkerInvoker + 'static> {
    invoker: Arc<W>,
    /// Hard per-task timeout handed to the invoker
    timeout: Duration,
    /// Backstop for invokers that overrun their timeout
    grace: Duration,
    /// Highest number of simultaneously running tasks seen in the last batch
    peak_running: Arc<AtomicUsize>,
}

impl<W: WorkerInvoker + 'static> Executor<W> {
    pub fn new(invoker: Arc<W>, timeout: Duration) -> Self {
        Self {
            invoker,
            timeout,
            grace: DEFAULT_GRACE,
            peak_running: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn invoker(&self) -> &Arc<W> {
        &self.invoker
    }

    /// Peak concurrency observed during the most recent `execute` call.
    pub fn peak_running(&self) -> usize {
        self.peak_running.load(Ordering::SeqCst)
    }

    /// Execute all tasks, at most `max_concurrency` at a time.
    pub async fn execute(&self, tasks: Vec<Task>, max_concurrency: usize) -> Vec<WorkerResult> {
        let total = tasks.len();
        if total == 0 {
            return Vec::new();
        }

        let limit = max_concurrency.max(1);
        let semaphore = Arc::new(Semaphore::new(limit));
        let running = Arc::new(AtomicUsize::new(0));
        self.peak_running.store(0, Ordering::SeqCst);
        let (event_tx, mut event_rx) = mpsc::channel::<Completion>(total);

        log::info!("Executing {} tasks with max concurrency {}", total, limit);

        let mut domains = Vec::with_capacity(total);
        let mut handles = Vec::with_capacity(total);
        for (index, task) in tasks.into_iter().enumerate() {
            domains.push(task.domain.clone());

            let semaphore = semaphore.clone();
            let invoker = self.invoker.clone();
            let event_tx = event_tx.clone();
            let running = running.clone();
            let peak = self.peak_running.clone();
            let timeout = self.timeout;
            let deadline = self.timeout + self.grace;

            handles.push(tokio::spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(permit) => {
                        let (guard, now) = RunningGuard::enter(&running);
                        peak.fetch_max(now, Ordering::SeqCst);
                        log::debug!("Task {} started ({} running)", task.domain, now);

                        let start = Instant::now();
                        let result = match tokio::time::timeout(deadline, invoker.invoke(&task, timeout)).await {
                            Ok(result) => result,
                            Err(_) => {
                                log::warn!("Invoker for {} overran its timeout; abandoning", task.domain);
                                WorkerResult::timed_out(task.domain.clone(), timeout)
                            }
                        };

                        drop(guard);
                        drop(permit);
                        log::info!(
                            "Task {} finished success={} in {:?}",
                            task.domain,
                            result.success,
                            start.elapsed()
                        );
                        result
                    }
                    Err(_) => WorkerResult::failed(task.domain.clone(), "executor semaphore closed", Duration::ZERO),
                };
                let _ = event_tx.send(Completion { index, result }).await;
            }));
        }
        drop(event_tx);

        let mut results: Vec<Option<WorkerResult>> = vec![None; total];
        while let Some(completion) = event_rx.recv().await {
            results[completion.index] = Some(completion.result);
        }

        // Senders are all gone; any task without a result ended abnormally
        let outcomes = futures::future::join_all(handles).await;
        for (index, outcome) in outcomes.into_iter().enumerate() {
            if results[index].is_none() {
                let reason = match outcome {
                    Err(e) if e.is_panic() => "worker task panicked".to_string(),
                    Err(e) => format!("worker task failed: {}", e),
                    Ok(()) => "worker task ended without a result".to_string(),
                };
                log::error!("Task {}: {}", domains[index], reason);
                results[index] = Some(WorkerResult::failed(domains[index].clone(), reason, Duration::ZERO));
            }
        }

        results
            .into_iter()
            .zip(domains)
            .map(|(result, domain)| {
                result.unwrap_or_else(|| WorkerResult::failed(domain, "missing result", Duration::ZERO))
            })
            .collect()
    }
}
