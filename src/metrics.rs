//! Round counters

use crate::games::types::{CashOutKind, RoundOutcome};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub struct GameMetrics {
    start_time: Instant,
    rounds_started: AtomicU64,
    rounds_crashed: AtomicU64,
    manual_cash_outs: AtomicU64,
    auto_cash_outs: AtomicU64,
    rejected_starts: AtomicU64,
    bookkeeping_failures: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub rounds_started: u64,
    pub rounds_crashed: u64,
    pub manual_cash_outs: u64,
    pub auto_cash_outs: u64,
    pub rejected_starts: u64,
    pub bookkeeping_failures: u64,
}

impl GameMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            rounds_started: AtomicU64::new(0),
            rounds_crashed: AtomicU64::new(0),
            manual_cash_outs: AtomicU64::new(0),
            auto_cash_outs: AtomicU64::new(0),
            rejected_starts: AtomicU64::new(0),
            bookkeeping_failures: AtomicU64::new(0),
        }
    }

    pub fn record_start(&self) {
        self.rounds_started.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_rejection(&self) {
        self.rejected_starts.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_resolution(&self, outcome: RoundOutcome) {
        let counter = match outcome {
            RoundOutcome::Crashed => &self.rounds_crashed,
            RoundOutcome::CashedOut(CashOutKind::Manual) => &self.manual_cash_outs,
            RoundOutcome::CashedOut(CashOutKind::Auto) => &self.auto_cash_outs,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_bookkeeping_failure(&self) {
        self.bookkeeping_failures.fetch_add(1, Ordering::SeqCst);
    }

    pub fn total_runtime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.total_runtime().as_secs(),
            rounds_started: self.rounds_started.load(Ordering::SeqCst),
            rounds_crashed: self.rounds_crashed.load(Ordering::SeqCst),
            manual_cash_outs: self.manual_cash_outs.load(Ordering::SeqCst),
            auto_cash_outs: self.auto_cash_outs.load(Ordering::SeqCst),
            rejected_starts: self.rejected_starts.load(Ordering::SeqCst),
            bookkeeping_failures: self.bookkeeping_failures.load(Ordering::SeqCst),
        }
    }
}

impl Default for GameMetrics {
    fn default() -> Self {
        Self::new()
    }
}
