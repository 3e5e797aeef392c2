//! In-memory ledger
//!
//! Backs the persistence port for the standalone server and for tests. Each
//! player holds one record per wallet, opened lazily with the configured
//! starting balance the first time the wallet is touched.

use crate::common::traits::{PersistencePort, PersistenceResult};
use crate::common::types::{HistoryRecord, PlayerId, Wallet};
use crate::config::{CrashConfig, LedgerConfig};
use crate::errors::PersistenceError;
use crate::games::achievements::Task;
use async_trait::async_trait;
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use std::collections::BTreeSet;

/// Everything stored for one wallet of one player
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WalletRecord {
    pub balance: f64,
    pub history: Vec<HistoryRecord>,
    /// Sum of profitable round results; losses never reduce it
    pub cumulative_earnings: f64,
    pub ranking_tier: Option<String>,
    pub achieved_tasks: BTreeSet<u32>,
}

pub struct InMemoryLedger {
    accounts: DashMap<(PlayerId, Wallet), WalletRecord>,
    tasks: Vec<Task>,
    opening: LedgerConfig,
}

impl InMemoryLedger {
    pub fn new(opening: LedgerConfig, tasks: Vec<Task>) -> Self {
        Self {
            accounts: DashMap::new(),
            tasks,
            opening,
        }
    }

    pub fn from_config(config: &CrashConfig) -> Self {
        Self::new(config.ledger.clone(), config.tasks.clone())
    }

    fn opening_balance(&self, wallet: Wallet) -> f64 {
        match wallet {
            Wallet::Real => self.opening.starting_real_balance,
            Wallet::Virtual => self.opening.starting_virtual_balance,
        }
    }

    fn account(&self, player_id: &str, wallet: Wallet) -> RefMut<'_, (PlayerId, Wallet), WalletRecord> {
        let balance = self.opening_balance(wallet);
        self.accounts
            .entry((player_id.to_string(), wallet))
            .or_insert_with(|| WalletRecord {
                balance,
                ..Default::default()
            })
    }

    /// Credit a wallet outside of any round
    pub fn deposit(&self, player_id: &str, wallet: Wallet, amount: f64) -> f64 {
        let mut account = self.account(player_id, wallet);
        account.balance += amount;
        account.balance
    }

    /// Copy of the stored record, if the wallet has been opened
    pub fn record(&self, player_id: &str, wallet: Wallet) -> PersistenceResult<WalletRecord> {
        self.accounts
            .get(&(player_id.to_string(), wallet))
            .map(|r| r.value().clone())
            .ok_or_else(|| PersistenceError::AccountNotFound {
                player_id: player_id.to_string(),
                wallet,
            })
    }

    pub fn history(&self, player_id: &str, wallet: Wallet) -> PersistenceResult<Vec<HistoryRecord>> {
        self.record(player_id, wallet).map(|r| r.history)
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }
}

#[async_trait]
impl PersistencePort for InMemoryLedger {
    async fn balance(&self, player_id: &str, wallet: Wallet) -> PersistenceResult<f64> {
        Ok(self.account(player_id, wallet).balance)
    }

    async fn apply_round_result(
        &self,
        player_id: &str,
        wallet: Wallet,
        record: &HistoryRecord,
        profit_delta: f64,
    ) -> PersistenceResult<()> {
        let mut account = self.account(player_id, wallet);
        account.balance += profit_delta;
        if profit_delta > 0.0 {
            account.cumulative_earnings += profit_delta;
        }
        account.history.push(record.clone());
        Ok(())
    }

    async fn cumulative_earnings(&self, player_id: &str, wallet: Wallet) -> PersistenceResult<f64> {
        Ok(self.account(player_id, wallet).cumulative_earnings)
    }

    async fn set_ranking_tier(&self, player_id: &str, wallet: Wallet, tier: &str) -> PersistenceResult<()> {
        self.account(player_id, wallet).ranking_tier = Some(tier.to_string());
        Ok(())
    }

    async fn achieved_tasks(&self, player_id: &str, wallet: Wallet) -> PersistenceResult<BTreeSet<u32>> {
        Ok(self.account(player_id, wallet).achieved_tasks.clone())
    }

    async fn configured_tasks(&self) -> PersistenceResult<Vec<Task>> {
        Ok(self.tasks.clone())
    }

    async fn merge_achieved_tasks(
        &self,
        player_id: &str,
        wallet: Wallet,
        indices: &BTreeSet<u32>,
    ) -> PersistenceResult<()> {
        self.account(player_id, wallet)
            .achieved_tasks
            .extend(indices.iter().copied());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::HistorySummary;
    use chrono::Utc;

    fn ledger() -> InMemoryLedger {
        InMemoryLedger::new(LedgerConfig::default(), Vec::new())
    }

    fn record(crash: Option<f64>, stop: Option<f64>, profit: f64) -> HistoryRecord {
        HistoryRecord {
            date: Utc::now(),
            crash,
            bet: 5.0,
            stop,
            profit,
        }
    }

    #[tokio::test]
    async fn test_wallets_open_with_configured_balance() {
        let ledger = ledger();
        assert_eq!(ledger.balance("alice", Wallet::Virtual).await.unwrap(), 10.0);
        assert_eq!(ledger.balance("alice", Wallet::Real).await.unwrap(), 0.0);
        assert_eq!(ledger.account_count(), 2);
    }

    #[tokio::test]
    async fn test_round_results_update_balance_and_earnings() {
        let ledger = ledger();
        ledger
            .apply_round_result("alice", Wallet::Virtual, &record(None, Some(2.0), 5.0), 5.0)
            .await
            .unwrap();
        ledger
            .apply_round_result("alice", Wallet::Virtual, &record(Some(1.3), None, -5.0), -5.0)
            .await
            .unwrap();

        let stored = ledger.record("alice", Wallet::Virtual).unwrap();
        assert_eq!(stored.balance, 10.0);
        assert_eq!(stored.cumulative_earnings, 5.0);
        assert_eq!(stored.history.len(), 2);

        let summary = HistorySummary::from_records(&stored.history);
        assert_eq!((summary.games, summary.wins, summary.losses), (2, 1, 1));
    }

    #[tokio::test]
    async fn test_wallets_are_independent() {
        let ledger = ledger();
        ledger.deposit("alice", Wallet::Real, 50.0);
        ledger
            .apply_round_result("alice", Wallet::Real, &record(Some(1.1), None, -20.0), -20.0)
            .await
            .unwrap();

        assert_eq!(ledger.balance("alice", Wallet::Real).await.unwrap(), 30.0);
        assert_eq!(ledger.balance("alice", Wallet::Virtual).await.unwrap(), 10.0);
    }

    #[tokio::test]
    async fn test_merge_achieved_tasks_is_a_union() {
        let ledger = ledger();
        let first: BTreeSet<u32> = [1, 3].into_iter().collect();
        let second: BTreeSet<u32> = [3, 4].into_iter().collect();

        ledger.merge_achieved_tasks("bob", Wallet::Virtual, &first).await.unwrap();
        ledger.merge_achieved_tasks("bob", Wallet::Virtual, &second).await.unwrap();

        let achieved = ledger.achieved_tasks("bob", Wallet::Virtual).await.unwrap();
        assert_eq!(achieved.into_iter().collect::<Vec<_>>(), vec![1, 3, 4]);
    }

    #[test]
    fn test_unknown_account_history_fails() {
        let ledger = ledger();
        assert!(matches!(
            ledger.history("ghost", Wallet::Real),
            Err(PersistenceError::AccountNotFound { .. })
        ));
    }
}
