//! Crashpoint - Crash Game Round Engine
//!
//! A wager rides a rising multiplier curve until a pre-sampled crash point.
//! The player wins by cashing out first, manually or through an auto-stop
//! target. This crate holds the round state machine, crash point sampling,
//! payout and ranking/achievement bookkeeping, plus a WebSocket server
//! that exposes it.

pub mod api;
pub mod clock;
pub mod common;
pub mod config;
pub mod errors;
pub mod games;
pub mod metrics;
pub mod storage;

pub use clock::{ManualClock, TimerHandle, TokioClock};
pub use common::traits::{Clock, NotificationPort, PersistencePort};
pub use common::types::{HistoryRecord, HistorySummary, PlayerId, RoundTicket, Wallet};
pub use config::{ConfigLoader, CrashConfig};
pub use errors::{CrashError, CrashResult, RoundError};
pub use games::{RoundEngine, Settlement, StartRequest};
pub use storage::InMemoryLedger;
