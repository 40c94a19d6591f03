//! Poll loop with two-interval rescheduling.
//!
//! One loop per worker role. A cycle never overlaps another: the next one
//! is scheduled only after the previous cycle has fully completed, whatever
//! its outcome, including a panic.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::error::RelayError;

/// What a completed cycle found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// An entry was processed successfully
    Worked,
    /// Nothing was waiting
    Idle,
}

/// One unit of polled work.
#[async_trait]
pub trait Cycle: Send {
    /// Role name used in logs.
    fn role(&self) -> &'static str;

    async fn run_cycle(&mut self) -> Result<CycleOutcome, RelayError>;
}

/// Reschedule delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intervals {
    /// After a cycle that found nothing or failed
    pub idle: Duration,
    /// After a cycle that did work, to drain a backlog quickly
    pub active: Duration,
}

impl Intervals {
    pub fn new(idle: Duration, active: Duration) -> Self {
        Self { idle, active }
    }

    /// Delay before the next cycle.
    pub fn next_interval(&self, last_cycle_did_work: bool) -> Duration {
        if last_cycle_did_work {
            self.active
        } else {
            self.idle
        }
    }
}

/// Single-worker cooperative loop driving a [`Cycle`].
pub struct PollLoop<C> {
    cycle: C,
    intervals: Intervals,
}

impl<C: Cycle> PollLoop<C> {
    pub fn new(cycle: C, intervals: Intervals) -> Self {
        Self { cycle, intervals }
    }

    pub fn cycle(&self) -> &C {
        &self.cycle
    }

    /// Run one cycle and return the delay before the next.
    ///
    /// Errors and panics are logged and answered with the idle interval.
    pub async fn tick(&mut self) -> Duration {
        let role = self.cycle.role();
        let result = AssertUnwindSafe(self.cycle.run_cycle()).catch_unwind().await;

        let did_work = match result {
            Ok(Ok(CycleOutcome::Worked)) => true,
            Ok(Ok(CycleOutcome::Idle)) => false,
            Ok(Err(e)) => {
                warn!(role = role, error = %e, "cycle_failed");
                false
            }
            Err(panic) => {
                let e = RelayError::Panicked(panic_message(panic.as_ref()));
                error!(role = role, error = %e, "cycle_panicked");
                false
            }
        };

        let delay = self.intervals.next_interval(did_work);
        debug!(role = role, did_work = did_work, delay_ms = delay.as_millis() as u64, "cycle_rescheduled");
        delay
    }

    /// Run cycles until `shutdown` completes.
    ///
    /// Shutdown is only observed between cycles; a running cycle is never
    /// interrupted.
    pub async fn run_until<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let role = self.cycle.role();
        info!(
            role = role,
            idle_ms = self.intervals.idle.as_millis() as u64,
            active_ms = self.intervals.active.as_millis() as u64,
            "poll_loop_started"
        );

        tokio::pin!(shutdown);

        loop {
            let delay = self.tick().await;
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!(role = role, "poll_loop_stopping");
                    break;
                }
                _ = sleep(delay) => {}
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::error::TransportError;
    use tokio::sync::oneshot;

    enum Step {
        Work,
        Nothing,
        Fail,
        Panic,
    }

    struct Scripted {
        steps: VecDeque<Step>,
    }

    #[async_trait]
    impl Cycle for Scripted {
        fn role(&self) -> &'static str {
            "scripted"
        }

        async fn run_cycle(&mut self) -> Result<CycleOutcome, RelayError> {
            match self.steps.pop_front() {
                Some(Step::Work) => Ok(CycleOutcome::Worked),
                Some(Step::Fail) => Err(TransportError::Timeout(1).into()),
                Some(Step::Panic) => panic!("boom"),
                Some(Step::Nothing) | None => Ok(CycleOutcome::Idle),
            }
        }
    }

    fn intervals() -> Intervals {
        Intervals::new(Duration::from_millis(3000), Duration::from_millis(500))
    }

    #[test]
    fn test_next_interval() {
        let intervals = intervals();
        assert_eq!(intervals.next_interval(true), Duration::from_millis(500));
        assert_eq!(intervals.next_interval(false), Duration::from_millis(3000));
    }

    #[tokio::test]
    async fn test_tick_picks_interval_from_outcome() {
        let steps = VecDeque::from([Step::Work, Step::Nothing, Step::Fail, Step::Panic, Step::Work]);
        let mut poll = PollLoop::new(Scripted { steps }, intervals());

        assert_eq!(poll.tick().await, Duration::from_millis(500));
        assert_eq!(poll.tick().await, Duration::from_millis(3000));
        assert_eq!(poll.tick().await, Duration::from_millis(3000));
        assert_eq!(poll.tick().await, Duration::from_millis(3000));
        // The loop survives the panic and keeps going
        assert_eq!(poll.tick().await, Duration::from_millis(500));
    }

    struct Counting {
        runs: Arc<AtomicUsize>,
        running: Arc<AtomicUsize>,
        max_running: Arc<AtomicUsize>,
        stop_after: usize,
        stop: Option<oneshot::Sender<()>>,
    }

    #[async_trait]
    impl Cycle for Counting {
        fn role(&self) -> &'static str {
            "counting"
        }

        async fn run_cycle(&mut self) -> Result<CycleOutcome, RelayError> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(2)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);

            let runs = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
            if runs == self.stop_after {
                if let Some(stop) = self.stop.take() {
                    let _ = stop.send(());
                }
            }
            Ok(CycleOutcome::Worked)
        }
    }

    #[tokio::test]
    async fn test_run_until_stops_between_cycles() {
        let (tx, rx) = oneshot::channel();
        let runs = Arc::new(AtomicUsize::new(0));
        let max_running = Arc::new(AtomicUsize::new(0));
        let cycle = Counting {
            runs: runs.clone(),
            running: Arc::new(AtomicUsize::new(0)),
            max_running: max_running.clone(),
            stop_after: 3,
            stop: Some(tx),
        };
        let poll = PollLoop::new(
            cycle,
            Intervals::new(Duration::from_millis(5), Duration::from_millis(1)),
        );

        tokio::time::timeout(
            Duration::from_secs(5),
            poll.run_until(async {
                let _ = rx.await;
            }),
        )
        .await
        .unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert_eq!(max_running.load(Ordering::SeqCst), 1);
    }
}
