//! Clock implementations
//!
//! `TokioClock` backs production rounds with spawned sleeps. `ManualClock`
//! keeps virtual time so round timing can be tested without waiting.

use crate::common::traits::Clock;
use futures::future::BoxFuture;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex,
};
use std::time::{Duration, Instant};
use tokio::task::AbortHandle;

/// Cancellation handle for a scheduled callback
#[derive(Debug)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
    abort: Option<AbortHandle>,
}

impl TimerHandle {
    pub fn new(cancelled: Arc<AtomicBool>, abort: Option<AbortHandle>) -> Self {
        Self { cancelled, abort }
    }

    /// Prevent the callback from running. No-op once it has started.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Wall-clock timers on the tokio runtime
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn schedule(&self, delay: Duration, task: BoxFuture<'static, ()>) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !flag.load(Ordering::SeqCst) {
                task.await;
            }
        });

        TimerHandle::new(cancelled, Some(handle.abort_handle()))
    }
}

struct PendingTimer {
    due: Duration,
    seq: u64,
    cancelled: Arc<AtomicBool>,
    task: BoxFuture<'static, ()>,
}

/// Virtual clock driven by `advance`
pub struct ManualClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
    pending: Mutex<Vec<PendingTimer>>,
    next_seq: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
            pending: Mutex::new(Vec::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Virtual time elapsed since the clock was created
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of scheduled callbacks that are neither run nor cancelled
    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|t| !t.cancelled.load(Ordering::SeqCst))
            .count()
    }

    /// Move virtual time forward, running every callback that falls due in order
    pub async fn advance(&self, by: Duration) {
        let target = self.elapsed() + by;

        while let Some(timer) = self.pop_due(target) {
            self.set_elapsed(timer.due.max(self.elapsed()));
            if !timer.cancelled.load(Ordering::SeqCst) {
                timer.task.await;
            }
        }

        self.set_elapsed(target);
    }

    /// Move virtual time forward without running anything that falls due.
    ///
    /// Simulates a caller that observes the clock before a due timer gets to run.
    pub fn skip(&self, by: Duration) {
        let target = self.elapsed() + by;
        self.set_elapsed(target);
    }

    fn pop_due(&self, target: Duration) -> Option<PendingTimer> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        let index = pending
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= target)
            .min_by_key(|(_, t)| (t.due, t.seq))
            .map(|(i, _)| i)?;
        Some(pending.swap_remove(index))
    }

    fn set_elapsed(&self, value: Duration) {
        *self.elapsed.lock().unwrap_or_else(|e| e.into_inner()) = value;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn schedule(&self, delay: Duration, task: BoxFuture<'static, ()>) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let timer = PendingTimer {
            due: self.elapsed() + delay,
            seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
            cancelled: cancelled.clone(),
            task,
        };
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(timer);

        TimerHandle::new(cancelled, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::AtomicUsize;

    fn counting_task(counter: &Arc<AtomicUsize>) -> BoxFuture<'static, ()> {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
        .boxed()
    }

    #[tokio::test]
    async fn test_manual_clock_runs_due_tasks_only() {
        let clock = ManualClock::new();
        let counter = Arc::new(AtomicUsize::new(0));

        clock.schedule(Duration::from_secs(5), counting_task(&counter));
        clock.schedule(Duration::from_secs(10), counting_task(&counter));

        clock.advance(Duration::from_secs(6)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(clock.pending_count(), 1);

        clock.advance(Duration::from_secs(4)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(clock.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_manual_clock_skips_cancelled_tasks() {
        let clock = ManualClock::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let handle = clock.schedule(Duration::from_secs(1), counting_task(&counter));
        handle.cancel();
        assert!(handle.is_cancelled());

        clock.advance(Duration::from_secs(2)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_manual_clock_now_tracks_virtual_time() {
        let clock = ManualClock::new();
        let start = clock.now();
        clock.set_elapsed(Duration::from_millis(1500));
        assert_eq!(clock.now() - start, Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_cancel_prevents_run() {
        let clock = TokioClock;
        let fired = Arc::new(AtomicUsize::new(0));

        let keep = clock.schedule(Duration::from_millis(100), counting_task(&fired));
        let drop_me = clock.schedule(Duration::from_millis(100), counting_task(&fired));
        drop_me.cancel();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!keep.is_cancelled());
    }
}
