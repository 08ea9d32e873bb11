use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};

use super::ScheduledJob;

/// How a failed run is repeated before the slot waits for the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delay: Duration,
    /// Total runs per tick, the first one included.
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub const NONE: RetryPolicy = RetryPolicy {
        delay: Duration::ZERO,
        max_attempts: 1,
    };
}

/// One job plus the flag that keeps it from running twice at once. A tick
/// that lands while the previous run is still going (retries included) is
/// dropped, not queued.
#[derive(Clone)]
pub struct JobSlot {
    job: Arc<dyn ScheduledJob>,
    running: Arc<AtomicBool>,
    retry: RetryPolicy,
}

struct RunPermit(Arc<AtomicBool>);

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl JobSlot {
    pub fn new(job: Arc<dyn ScheduledJob>) -> Self {
        Self {
            job,
            running: Arc::new(AtomicBool::new(false)),
            retry: RetryPolicy::NONE,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = RetryPolicy {
            max_attempts: retry.max_attempts.max(1),
            ..retry
        };
        self
    }

    fn try_start(&self) -> Option<RunPermit> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunPermit(self.running.clone()))
    }

    /// Starts a run for `now` unless one is already in flight.
    pub fn fire(&self, now: DateTime<Utc>) -> Option<JoinHandle<()>> {
        let Some(permit) = self.try_start() else {
            warn!("{} is still running, skipping tick at {}", self.job.name(), now);
            return None;
        };

        let job = self.job.clone();
        let retry = self.retry;
        Some(tokio::spawn(async move {
            let _permit = permit;
            let started = Instant::now();
            for attempt in 1..=retry.max_attempts {
                let elapsed = chrono::Duration::from_std(started.elapsed())
                    .unwrap_or_else(|_| chrono::Duration::zero());
                match job.run(now + elapsed).await {
                    Ok(count) => {
                        info!("🔄 {} finished ({} affected)", job.name(), count);
                        return;
                    }
                    Err(e) if attempt < retry.max_attempts => {
                        warn!(
                            "{} failed (attempt {}/{}), retrying in {:?}: {}",
                            job.name(),
                            attempt,
                            retry.max_attempts,
                            retry.delay,
                            e
                        );
                        tokio::time::sleep(retry.delay).await;
                    }
                    Err(e) => error!("{} failed after {} attempts: {}", job.name(), attempt, e),
                }
            }
        }))
    }

    /// Runs the job once right away, outside its schedule. Covers ticks
    /// missed while the process was down.
    pub fn catch_up(&self) -> Option<JoinHandle<()>> {
        info!("⏳ {} catching up on start", self.job.name());
        self.fire(Utc::now())
    }

    /// Fires the job at every upcoming time of `schedule`, read as wall-clock
    /// time in `timezone`.
    pub fn spawn(self, schedule: Schedule, timezone: Tz) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("⏳ {} scheduled in {}", self.job.name(), timezone);
            let mut after = Utc::now().with_timezone(&timezone);
            loop {
                let Some(next) = schedule.after(&after).next() else {
                    warn!("{} has no upcoming runs, stopping", self.job.name());
                    return;
                };
                let wait = (next.with_timezone(&Utc) - Utc::now())
                    .to_std()
                    .unwrap_or(Duration::ZERO);
                tokio::time::sleep(wait).await;

                self.fire(next.with_timezone(&Utc).max(Utc::now()));
                after = next;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobError;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU64;
    use tokio::sync::Notify;

    struct GatedJob {
        gate: Notify,
        runs: AtomicU64,
        fail: bool,
    }

    #[async_trait]
    impl ScheduledJob for GatedJob {
        fn name(&self) -> &'static str {
            "gated job"
        }

        async fn run(&self, _now: DateTime<Utc>) -> Result<u64, JobError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            if self.fail {
                return Err(JobError::Delivery("gateway down".to_string()));
            }
            Ok(1)
        }
    }

    fn gated(fail: bool) -> Arc<GatedJob> {
        Arc::new(GatedJob {
            gate: Notify::new(),
            runs: AtomicU64::new(0),
            fail,
        })
    }

    #[tokio::test]
    async fn test_overlapping_tick_is_skipped() {
        let job = gated(false);
        let slot = JobSlot::new(job.clone());

        let first = slot.fire(Utc::now()).expect("first tick runs");
        assert!(slot.fire(Utc::now()).is_none());

        job.gate.notify_one();
        first.await.unwrap();
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);

        let second = slot.fire(Utc::now()).expect("slot is free again");
        job.gate.notify_one();
        second.await.unwrap();
        assert_eq!(job.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_run_releases_the_slot() {
        let job = gated(true);
        let slot = JobSlot::new(job.clone());

        let run = slot.fire(Utc::now()).unwrap();
        job.gate.notify_one();
        run.await.unwrap();

        assert!(!slot.running.load(Ordering::Acquire));
        let again = slot.fire(Utc::now()).unwrap();
        job.gate.notify_one();
        again.await.unwrap();
    }

    struct FlakyJob {
        failures_left: AtomicU64,
        seen: std::sync::Mutex<Vec<DateTime<Utc>>>,
    }

    #[async_trait]
    impl ScheduledJob for FlakyJob {
        fn name(&self) -> &'static str {
            "flaky job"
        }

        async fn run(&self, now: DateTime<Utc>) -> Result<u64, JobError> {
            self.seen.lock().unwrap().push(now);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(JobError::Delivery("database blip".to_string()));
            }
            Ok(1)
        }
    }

    fn flaky(failures: u64) -> Arc<FlakyJob> {
        Arc::new(FlakyJob {
            failures_left: AtomicU64::new(failures),
            seen: std::sync::Mutex::new(Vec::new()),
        })
    }

    const RETRY: RetryPolicy = RetryPolicy {
        delay: Duration::from_secs(60),
        max_attempts: 5,
    };

    #[tokio::test(start_paused = true)]
    async fn test_failed_run_is_retried_until_it_succeeds() {
        let job = flaky(2);
        let slot = JobSlot::new(job.clone()).with_retry(RETRY);
        let tick = Utc::now();

        let run = slot.fire(tick).unwrap();
        assert!(slot.fire(tick).is_none(), "retries keep the slot busy");
        run.await.unwrap();

        let seen = job.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], tick);
        assert_eq!(seen[2] - tick, chrono::Duration::seconds(120));
        assert!(!slot.running.load(Ordering::Acquire));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_stop_at_the_attempt_limit() {
        let job = flaky(u64::MAX);
        let slot = JobSlot::new(job.clone()).with_retry(RETRY);

        slot.fire(Utc::now()).unwrap().await.unwrap();

        assert_eq!(job.seen.lock().unwrap().len(), 5);
        assert!(!slot.running.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn test_without_retry_a_failure_runs_once() {
        let job = flaky(1);
        let slot = JobSlot::new(job.clone());

        slot.fire(Utc::now()).unwrap().await.unwrap();

        assert_eq!(job.seen.lock().unwrap().len(), 1);
    }
}
