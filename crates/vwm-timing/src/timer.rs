//! Repeating timer with a single armed slot.
//!
//! A `Timer` owns at most one spawned task. Every `start` bumps the slot's
//! generation; the task re-checks its generation after each sleep and after
//! each callback, so a task that lost the race with `stop` exits without
//! touching anything.
//!
//! Timers are meant for a current-thread runtime, where `stop` and the
//! liveness check never interleave: once `stop` returns, no further callback
//! runs. On a multi-thread runtime a callback that already passed its check
//! may still complete after a `stop` issued from another thread.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Side-effect callback invoked from a timer task.
pub type Callback = Arc<dyn Fn() + Send + Sync>;

/// Computes the delay before the next firing.
pub type IntervalFn = Arc<dyn Fn() -> Duration + Send + Sync>;

/// Errors from timer construction
#[derive(Debug, Error)]
pub enum TimingError {
    #[error("No tokio runtime is available to drive timers")]
    NoRuntime,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    task: Option<JoinHandle<()>>,
}

struct TimerInner {
    name: &'static str,
    runtime: Handle,
    interval: IntervalFn,
    callback: Callback,
    slot: Mutex<Slot>,
}

impl TimerInner {
    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_live(&self, generation: u64) -> bool {
        self.slot().generation == generation
    }
}

/// Restartable repeating timer.
///
/// The delay is recomputed through the interval closure before each arm,
/// after the previous callback has returned, so firings never overlap.
pub struct Timer {
    inner: Arc<TimerInner>,
}

impl Timer {
    /// Create a stopped timer bound to the current tokio runtime.
    pub fn new<I, F>(name: &'static str, interval: I, callback: F) -> Result<Self, TimingError>
    where
        I: Fn() -> Duration + Send + Sync + 'static,
        F: Fn() + Send + Sync + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| TimingError::NoRuntime)?;
        Ok(Self {
            inner: Arc::new(TimerInner {
                name,
                runtime,
                interval: Arc::new(interval),
                callback: Arc::new(callback),
                slot: Mutex::new(Slot::default()),
            }),
        })
    }

    /// Arm the timer. No-op while already armed.
    pub fn start(&self) {
        let first = Instant::now() + (self.inner.interval)();

        let mut slot = self.inner.slot();
        if slot.task.is_some() {
            trace!("{} timer already armed", self.inner.name);
            return;
        }
        slot.generation = slot.generation.wrapping_add(1);
        let generation = slot.generation;
        let weak = Arc::downgrade(&self.inner);

        slot.task = Some(self.inner.runtime.spawn(run(weak, generation, first)));
        debug!("{} timer armed (generation {})", self.inner.name, generation);
    }

    /// Cancel the pending firing, if any.
    ///
    /// Called from the runtime's own thread (or from inside the callback),
    /// no callback runs after this returns.
    pub fn stop(&self) {
        let mut slot = self.inner.slot();
        slot.generation = slot.generation.wrapping_add(1);
        if let Some(task) = slot.task.take() {
            task.abort();
            debug!("{} timer stopped", self.inner.name);
        }
    }

    /// Check if a firing is pending
    pub fn is_running(&self) -> bool {
        self.inner.slot().task.is_some()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run(weak: Weak<TimerInner>, generation: u64, first: Instant) {
    let mut deadline = first;
    loop {
        tokio::time::sleep_until(deadline).await;

        let Some(inner) = weak.upgrade() else { break };
        if !inner.is_live(generation) {
            break;
        }

        (inner.callback)();

        // The callback may have stopped or restarted this timer.
        if !inner.is_live(generation) {
            break;
        }
        deadline = Instant::now() + (inner.interval)();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    fn counting_timer(every: Duration) -> (Timer, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let timer = Timer::new("test", move || every, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        (timer, count)
    }

    #[test]
    fn test_requires_runtime() {
        let result = Timer::new("test", || Duration::from_secs(1), || {});
        assert!(matches!(result, Err(TimingError::NoRuntime)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeats_until_stopped() {
        let (timer, count) = counting_timer(Duration::from_millis(100));
        timer.start();
        assert!(timer.is_running());

        sleep(Duration::from_millis(350)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        timer.stop();
        assert!(!timer.is_running());
        sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let (timer, count) = counting_timer(Duration::from_millis(100));
        timer.start();
        timer.start();
        timer.start();

        sleep(Duration::from_millis(150)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_leaves_single_task() {
        let (timer, count) = counting_timer(Duration::from_millis(100));
        timer.start();
        sleep(Duration::from_millis(50)).await;
        timer.stop();
        timer.start();

        // Only the restarted task fires, 100ms after the restart
        sleep(Duration::from_millis(75)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_at_deadline_suppresses_firing() {
        let (timer, count) = counting_timer(Duration::from_millis(100));
        let timer = Arc::new(timer);
        timer.start();

        // Competes with the timer for the same instant
        let t = timer.clone();
        let c = count.clone();
        let stopper = tokio::spawn(async move {
            sleep(Duration::from_millis(100)).await;
            t.stop();
            c.load(Ordering::SeqCst)
        });
        let at_stop = stopper.await.unwrap();
        assert!(at_stop <= 1);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), at_stop);
        assert!(!timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let (timer, count) = counting_timer(Duration::from_millis(100));
        timer.start();
        drop(timer);

        sleep(Duration::from_secs(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_can_stop_its_own_timer() {
        let slot: Arc<Mutex<Option<Timer>>> = Arc::new(Mutex::new(None));
        let count = Arc::new(AtomicUsize::new(0));

        let s = slot.clone();
        let c = count.clone();
        let timer = Timer::new("self-stop", || Duration::from_millis(10), move || {
            c.fetch_add(1, Ordering::SeqCst);
            if let Some(t) = s.lock().unwrap().as_ref() {
                t.stop();
            }
        })
        .unwrap();
        timer.start();
        *slot.lock().unwrap() = Some(timer);

        sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
