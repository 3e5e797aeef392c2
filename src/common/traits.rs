//! Collaborator ports
//!
//! The round engine never talks to a database, a socket or the system timer
//! directly. Every external effect goes through one of these traits so the
//! state machine can be driven in isolation by mocks and a virtual clock.

use crate::clock::TimerHandle;
use crate::common::types::{HistoryRecord, RoundTicket, Wallet};
use crate::errors::PersistenceError;
use crate::games::achievements::Task;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Balance, history, ranking and achievement storage
#[async_trait]
pub trait PersistencePort: Send + Sync {
    /// Current balance of one of the player's wallets
    async fn balance(&self, player_id: &str, wallet: Wallet) -> PersistenceResult<f64>;

    /// Append a history record and apply the profit delta to the balance
    async fn apply_round_result(
        &self,
        player_id: &str,
        wallet: Wallet,
        record: &HistoryRecord,
        profit_delta: f64,
    ) -> PersistenceResult<()>;

    /// Sum of all profitable round results for the wallet
    async fn cumulative_earnings(&self, player_id: &str, wallet: Wallet) -> PersistenceResult<f64>;

    async fn set_ranking_tier(&self, player_id: &str, wallet: Wallet, tier: &str) -> PersistenceResult<()>;

    async fn achieved_tasks(&self, player_id: &str, wallet: Wallet) -> PersistenceResult<BTreeSet<u32>>;

    /// Static task configuration
    async fn configured_tasks(&self) -> PersistenceResult<Vec<Task>>;

    /// Union `indices` into the player's achieved-task set
    async fn merge_achieved_tasks(
        &self,
        player_id: &str,
        wallet: Wallet,
        indices: &BTreeSet<u32>,
    ) -> PersistenceResult<()>;
}

/// Fire-and-forget pushes to the player's live connection
pub trait NotificationPort: Send + Sync {
    fn send_started(&self, ticket: &RoundTicket);

    fn send_resolved(&self, ticket: &RoundTicket, record: &HistoryRecord);
}

/// Monotonic time source with deferred, cancellable callbacks
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    /// Run `task` once `delay` has elapsed unless the returned handle is cancelled first
    fn schedule(&self, delay: Duration, task: BoxFuture<'static, ()>) -> TimerHandle;
}
