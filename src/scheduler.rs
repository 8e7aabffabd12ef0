//! Fixed-interval scheduler with a single-flight guard
//!
//! The job runs once at startup and then on every interval tick. At most one
//! run is ever in flight: a trigger that arrives while a run is active returns
//! [`TriggerOutcome::Busy`] and is carried out right after the active run.
//! The periodic loop waits for each run before looking at the next tick, so a
//! late tick is delayed rather than stacked.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::error::Result;

/// Shortest accepted interval; a zero period is raised to this
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// A unit of scheduled work
pub trait Job: Send + 'static {
    fn name(&self) -> &str {
        "job"
    }

    fn run(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Completed,
    Failed,
    /// Another run was in flight; it will run the job again when done
    Busy,
}

/// Holds the in-flight flag for the duration of one run
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Scheduler<J> {
    job: Arc<Mutex<J>>,
    in_flight: Arc<AtomicBool>,
    pending: Arc<AtomicBool>,
    runs: Arc<AtomicU64>,
    interval: Duration,
}

impl<J> Clone for Scheduler<J> {
    fn clone(&self) -> Self {
        Self {
            job: Arc::clone(&self.job),
            in_flight: Arc::clone(&self.in_flight),
            pending: Arc::clone(&self.pending),
            runs: Arc::clone(&self.runs),
            interval: self.interval,
        }
    }
}

impl<J: Job> Scheduler<J> {
    /// `interval` is clamped to at least [`MIN_INTERVAL`]
    pub fn new(job: J, interval: Duration) -> Self {
        if interval < MIN_INTERVAL {
            warn!(
                "Scheduler interval {:?} is too short, using {:?}",
                interval, MIN_INTERVAL
            );
        }
        let interval = interval.max(MIN_INTERVAL);

        Self {
            job: Arc::new(Mutex::new(job)),
            in_flight: Arc::new(AtomicBool::new(false)),
            pending: Arc::new(AtomicBool::new(false)),
            runs: Arc::new(AtomicU64::new(0)),
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Runs that actually executed (completed or failed)
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Acquire)
    }

    /// Run the job now on the calling thread.
    ///
    /// If a run is already in flight nothing starts here: the request is
    /// recorded and the thread holding the run executes it once more when it
    /// finishes. Any number of such requests collapse into one extra run.
    pub fn trigger(&self) -> TriggerOutcome {
        self.pending.store(true, Ordering::SeqCst);
        let mut outcome = TriggerOutcome::Busy;

        loop {
            let Some(guard) = InFlightGuard::acquire(&self.in_flight) else {
                if outcome == TriggerOutcome::Busy {
                    warn!("Previous cycle still running; trigger deferred");
                }
                return outcome;
            };

            while self.pending.swap(false, Ordering::SeqCst) {
                outcome = self.run_once();
            }
            drop(guard);

            // A trigger may have landed between the last check and the release
            if !self.pending.load(Ordering::SeqCst) {
                return outcome;
            }
        }
    }

    fn run_once(&self) -> TriggerOutcome {
        let mut job = self.job.lock().unwrap_or_else(PoisonError::into_inner);
        let started = Instant::now();
        info!("Running {}", job.name());

        let outcome = match job.run() {
            Ok(()) => {
                info!(
                    "{} finished in {:.1}s",
                    job.name(),
                    started.elapsed().as_secs_f64()
                );
                TriggerOutcome::Completed
            }
            Err(e) => {
                error!(
                    "{} aborted: {}. Waiting for the next trigger.",
                    job.name(),
                    e
                );
                TriggerOutcome::Failed
            }
        };

        self.runs.fetch_add(1, Ordering::AcqRel);
        outcome
    }

    /// Run immediately, then every interval, until `shutdown` resolves.
    ///
    /// Each run happens on a blocking thread; shutdown is noticed between runs.
    pub async fn run_until<S>(&self, shutdown: S)
    where
        S: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            "Scheduler started: first run now, then every {}s",
            self.interval.as_secs()
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping scheduler");
                    break;
                }
                _ = ticker.tick() => {
                    let scheduler = self.clone();
                    match tokio::task::spawn_blocking(move || scheduler.trigger()).await {
                        Ok(outcome) => debug!("Trigger outcome: {:?}", outcome),
                        Err(e) => error!("Scheduled run panicked: {}", e),
                    }
                }
            }
        }
    }
}
