//! Bounded waits for extraction jobs that cannot be cancelled.
//!
//! A job runs on its own detached thread while a timer runs on the async
//! runtime. Both report to one [`Arbiter`]; the first to claim it decides
//! the [`Settled`] outcome and the other side's report is discarded. A job
//! that loses keeps running to completion in the background (it is
//! abandoned, not aborted) and its result is dropped without being seen.
//! The thread is not owned by the runtime, so dropping the runtime never
//! waits for an abandoned job.
//!
//! Jobs own their inputs (`move` closures over `Arc<[u8]>`), so an abandoned
//! job shares nothing with the fallback path that replaces it.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

/// How a bounded job ended, as seen by the caller.
#[derive(Debug)]
pub enum Settled<T> {
    Completed(T),
    TimedOut,
    Panicked,
}

impl<T> Settled<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            Settled::Completed(v) => Some(v),
            Settled::TimedOut | Settled::Panicked => None,
        }
    }
}

/// One-shot decision point: exactly one claimant wins.
#[derive(Default)]
struct Arbiter {
    settled: AtomicBool,
}

impl Arbiter {
    fn claim(&self) -> bool {
        !self.settled.swap(true, Ordering::AcqRel)
    }
}

/// Runs `job` on a detached worker thread, giving up after `limit`.
pub async fn run_bounded<T, F>(label: &'static str, limit: Duration, job: F) -> Settled<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let arbiter = Arc::new(Arbiter::default());
    let (tx, mut rx) = mpsc::channel::<Settled<T>>(1);

    let worker_arbiter = arbiter.clone();
    let worker_tx = tx.clone();
    let spawned = std::thread::Builder::new()
        .name(format!("bounded-{}", label.replace(' ', "-")))
        .spawn(move || {
            let outcome = match catch_unwind(AssertUnwindSafe(job)) {
                Ok(value) => Settled::Completed(value),
                Err(_) => Settled::Panicked,
            };
            if worker_arbiter.claim() {
                let _ = worker_tx.blocking_send(outcome);
            } else {
                tracing::debug!(job = label, "discarding result of abandoned job");
            }
        });
    if let Err(e) = spawned {
        tracing::warn!(job = label, error = %e, "could not start worker thread");
        return Settled::Panicked;
    }

    let timer_arbiter = arbiter;
    let timer = tokio::spawn(async move {
        tokio::time::sleep(limit).await;
        if timer_arbiter.claim() {
            let _ = tx.send(Settled::TimedOut).await;
        }
    });

    // Both senders only send after winning the claim, so the first message
    // is the decision.
    let outcome = rx.recv().await.unwrap_or(Settled::TimedOut);
    timer.abort();

    match &outcome {
        Settled::TimedOut => tracing::warn!(job = label, ?limit, "job timed out, abandoning it"),
        Settled::Panicked => tracing::warn!(job = label, "job panicked"),
        Settled::Completed(_) => {}
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn fast_job_completes() {
        let out = run_bounded("fast", Duration::from_secs(5), || 21 * 2).await;
        assert!(matches!(out, Settled::Completed(42)));
    }

    #[tokio::test]
    async fn slow_job_times_out_and_its_result_is_dropped() {
        let seen = Arc::new(AtomicUsize::new(0));
        let job_seen = seen.clone();
        let started = std::time::Instant::now();
        let out = run_bounded("slow", Duration::from_millis(20), move || {
            std::thread::sleep(Duration::from_millis(300));
            job_seen.fetch_add(1, Ordering::SeqCst);
            "late"
        })
        .await;
        assert!(matches!(out, Settled::TimedOut));
        assert!(started.elapsed() < Duration::from_millis(250));
        // the job has not finished yet when the caller moves on
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn panicking_job_is_reported() {
        let out: Settled<()> =
            run_bounded("panics", Duration::from_secs(5), || panic!("bad input")).await;
        assert!(matches!(out, Settled::Panicked));
    }

    #[test]
    fn dropping_runtime_does_not_wait_for_abandoned_job() {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        let started = std::time::Instant::now();
        let out = rt.block_on(run_bounded("stuck", Duration::from_millis(50), || {
            std::thread::sleep(Duration::from_secs(3));
        }));
        assert!(matches!(out, Settled::TimedOut));
        drop(rt);
        assert!(
            started.elapsed() < Duration::from_secs(1),
            "runtime shutdown waited {:?}",
            started.elapsed()
        );
    }

    #[test]
    fn arbiter_has_single_winner() {
        let arbiter = Arbiter::default();
        assert!(arbiter.claim());
        assert!(!arbiter.claim());
    }
}
