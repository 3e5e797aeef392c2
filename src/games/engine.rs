//! Round engine
//!
//! Drives every player's round from start to resolution. A round resolves
//! either when its scheduled timer fires (crash or auto-stop) or when the
//! player stops it; the session registry guarantees only one of the two paths
//! ever settles a given round.

use crate::clock::TokioClock;
use crate::common::traits::{Clock, NotificationPort, PersistencePort};
use crate::common::types::{round_cents, HistoryRecord, PlayerId, RoundTicket, Wallet};
use crate::config::GameConfig;
use crate::errors::{ConfigurationError, CrashResult, PersistenceError, RoundError};
use crate::games::achievements::{AchievementEvaluator, StreakState};
use crate::games::curve::CrashCurve;
use crate::games::outcome::{OutcomeGenerator, ThreadRngSource, UniformSource};
use crate::games::payout::PayoutCalculator;
use crate::games::ranking::RankingTable;
use crate::games::registry::SessionRegistry;
use crate::games::types::{CashOutKind, Resolution, ResolvedRound, Round, RoundOutcome};
use crate::metrics::GameMetrics;
use dashmap::DashMap;
use futures::FutureExt;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Request to place a bet and start a round
#[derive(Debug, Clone, PartialEq)]
pub struct StartRequest {
    pub player_id: PlayerId,
    pub bet_amount: f64,
    /// Target multiplier for an automatic cash-out; `None` means manual only
    pub auto_stop: Option<f64>,
    pub wallet: Wallet,
}

/// Derived records written after a round resolves
#[derive(Debug, Clone, PartialEq)]
pub struct Bookkeeping {
    /// Tasks unlocked by this round that the player had not achieved before
    pub unlocked_tasks: BTreeSet<u32>,
    pub ranking_tier: String,
    pub cumulative_earnings: f64,
}

/// Outcome of a resolution
///
/// `round` is authoritative once produced. A bookkeeping failure is reported
/// alongside it and never re-opens the round.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub round: ResolvedRound,
    pub record: HistoryRecord,
    pub bookkeeping: Result<Bookkeeping, PersistenceError>,
}

/// Crash round state machine for any number of concurrent players
#[derive(Clone)]
pub struct RoundEngine {
    curve: CrashCurve,
    generator: Arc<OutcomeGenerator>,
    ranking: Arc<RankingTable>,
    registry: Arc<SessionRegistry>,
    streaks: Arc<DashMap<PlayerId, StreakState>>,
    persistence: Arc<dyn PersistencePort>,
    notifier: Arc<dyn NotificationPort>,
    clock: Arc<dyn Clock>,
    metrics: Arc<GameMetrics>,
}

impl RoundEngine {
    pub fn builder(config: GameConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    /// Place a bet and start the player's round.
    ///
    /// Rejections leave no trace in the registry.
    pub async fn start(&self, request: StartRequest) -> Result<RoundTicket, RoundError> {
        let player_id = request.player_id.clone();
        let result = self.try_start(request).await;

        if let Err(e) = &result {
            self.metrics.record_rejection();
            warn!("Rejected start for player {}: {}", player_id, e);
        }
        result
    }

    async fn try_start(&self, request: StartRequest) -> Result<RoundTicket, RoundError> {
        let StartRequest {
            player_id,
            bet_amount,
            auto_stop,
            wallet,
        } = request;

        if !(bet_amount > 0.0 && bet_amount.is_finite()) {
            return Err(RoundError::InvalidBet(bet_amount));
        }
        if let Some(target) = auto_stop {
            if !(target >= 1.0 && target.is_finite()) {
                return Err(RoundError::InvalidAutoStop(target));
            }
        }
        // Cheap check before touching persistence; the registry insert below is authoritative
        if self.registry.is_active(&player_id) {
            return Err(RoundError::AlreadyActive(player_id));
        }

        let available = self.persistence.balance(&player_id, wallet).await?;
        if available < bet_amount {
            return Err(RoundError::InsufficientBalance {
                available,
                required: bet_amount,
            });
        }

        let crash_multiplier = self.generator.sample(wallet)?;
        let round = Round::new(
            player_id,
            wallet,
            bet_amount,
            auto_stop,
            crash_multiplier,
            self.clock.now(),
        );

        let (scheduled, at_multiplier) = round.scheduled_outcome();
        let delay = self
            .curve
            .delay_for(at_multiplier)
            .map_err(|_| RoundError::InvalidAutoStop(at_multiplier))?;

        let ticket = round.ticket().clone();
        let round_id = round.id();
        self.registry.insert(round)?;
        self.metrics.record_start();

        info!(
            "Round {} started for {} ({} wallet): bet {:.2}, auto-stop {:?}",
            round_id, ticket.player_id, wallet, bet_amount, auto_stop
        );
        debug!(
            "Round {} will be {} at {:.2}x in {:?}",
            round_id, scheduled, at_multiplier, delay
        );

        self.notifier.send_started(&ticket);

        let engine = self.clone();
        let player = ticket.player_id.clone();
        let timer = self.clock.schedule(
            delay,
            async move {
                engine.resolve_scheduled(&player, round_id).await;
            }
            .boxed(),
        );
        self.registry.attach_timer(&ticket.player_id, round_id, timer);

        Ok(ticket)
    }

    /// Cash out the player's running round at the current curve value.
    pub async fn stop(&self, player_id: &str) -> Result<Settlement, RoundError> {
        let round = self
            .registry
            .take(player_id)
            .ok_or_else(|| RoundError::NotActive(player_id.to_string()))?;

        let elapsed = self.clock.now().saturating_duration_since(round.started_at());
        let reached = self.curve.multiplier_after(elapsed);
        let (outcome, at_multiplier) = Self::classify_stop(&round, reached);

        debug!(
            "Stop for round {} after {:?}: curve at {:.4}x",
            round.id(),
            elapsed,
            reached
        );

        Ok(self.settle(round, outcome, at_multiplier).await)
    }

    /// A stop only cashes out manually if the curve has not yet reached the
    /// round's scheduled event; otherwise that event already happened.
    fn classify_stop(round: &Round, reached: f64) -> (RoundOutcome, f64) {
        let (scheduled, scheduled_at) = round.scheduled_outcome();
        if reached >= scheduled_at {
            return (scheduled, scheduled_at);
        }
        (
            RoundOutcome::CashedOut(CashOutKind::Manual),
            round_cents(reached).min(round.crash_multiplier()),
        )
    }

    async fn resolve_scheduled(&self, player_id: &str, round_id: Uuid) {
        let Some(round) = self.registry.take_if_current(player_id, round_id) else {
            debug!("Round {} for {} already resolved", round_id, player_id);
            return;
        };

        let (outcome, at_multiplier) = round.scheduled_outcome();
        let settlement = self.settle(round, outcome, at_multiplier).await;

        if let Err(e) = &settlement.bookkeeping {
            error!(
                "Bookkeeping failed for round {} of {}: {}",
                round_id, player_id, e
            );
        }
    }

    async fn settle(&self, round: Round, outcome: RoundOutcome, at_multiplier: f64) -> Settlement {
        let profit = PayoutCalculator::profit(round.bet_amount(), outcome, at_multiplier);
        let resolved = round.resolve(Resolution {
            outcome,
            at_multiplier,
            profit,
        });
        let record = resolved.history_record();

        self.metrics.record_resolution(outcome);
        info!(
            "Round {} for {} {} at {:.2}x (crash {:.2}x), profit {:.2}",
            resolved.ticket.round_id,
            resolved.ticket.player_id,
            outcome,
            at_multiplier,
            resolved.crash_multiplier,
            profit
        );

        self.notifier.send_resolved(&resolved.ticket, &record);

        let streak = self.update_streak(&resolved);
        let bookkeeping = self.record_bookkeeping(&resolved, &record, &streak).await;
        if bookkeeping.is_err() {
            self.metrics.record_bookkeeping_failure();
        }

        Settlement {
            round: resolved,
            record,
            bookkeeping,
        }
    }

    fn update_streak(&self, resolved: &ResolvedRound) -> StreakState {
        let mut streak = self
            .streaks
            .entry(resolved.ticket.player_id.clone())
            .or_default();
        streak.record(resolved);
        *streak
    }

    async fn record_bookkeeping(
        &self,
        resolved: &ResolvedRound,
        record: &HistoryRecord,
        streak: &StreakState,
    ) -> Result<Bookkeeping, PersistenceError> {
        let player_id = resolved.ticket.player_id.as_str();
        let wallet = resolved.ticket.wallet;

        self.persistence
            .apply_round_result(player_id, wallet, record, resolved.resolution.profit)
            .await?;

        let cumulative_earnings = self.persistence.cumulative_earnings(player_id, wallet).await?;
        let ranking_tier = self.ranking.tier_for(cumulative_earnings).to_string();
        self.persistence
            .set_ranking_tier(player_id, wallet, &ranking_tier)
            .await?;

        let tasks = self.persistence.configured_tasks().await?;
        let achieved = self.persistence.achieved_tasks(player_id, wallet).await?;
        let unlocked_tasks: BTreeSet<u32> = AchievementEvaluator::evaluate(&tasks, resolved, streak)
            .difference(&achieved)
            .copied()
            .collect();

        if !unlocked_tasks.is_empty() {
            self.persistence
                .merge_achieved_tasks(player_id, wallet, &unlocked_tasks)
                .await?;
            info!("Player {} unlocked tasks {:?}", player_id, unlocked_tasks);
        }

        Ok(Bookkeeping {
            unlocked_tasks,
            ranking_tier,
            cumulative_earnings,
        })
    }

    /// Void every running round without settling it
    pub fn cancel_all(&self) -> Vec<RoundTicket> {
        let cancelled = self.registry.cancel_all();
        if !cancelled.is_empty() {
            warn!("Cancelled {} running rounds", cancelled.len());
        }
        cancelled
    }

    pub fn active_round(&self, player_id: &str) -> Option<RoundTicket> {
        self.registry.lookup(player_id)
    }

    pub fn active_count(&self) -> usize {
        self.registry.active_count()
    }

    pub fn streak(&self, player_id: &str) -> StreakState {
        self.streaks
            .get(player_id)
            .map(|s| *s)
            .unwrap_or_default()
    }

    pub fn metrics(&self) -> Arc<GameMetrics> {
        Arc::clone(&self.metrics)
    }
}

/// Builder for a configured round engine
pub struct EngineBuilder {
    config: GameConfig,
    ranking: RankingTable,
    persistence: Option<Arc<dyn PersistencePort>>,
    notifier: Option<Arc<dyn NotificationPort>>,
    clock: Arc<dyn Clock>,
    source: Arc<dyn UniformSource>,
    metrics: Arc<GameMetrics>,
}

impl EngineBuilder {
    fn new(config: GameConfig) -> Self {
        Self {
            config,
            ranking: RankingTable::default(),
            persistence: None,
            notifier: None,
            clock: Arc::new(TokioClock),
            source: Arc::new(ThreadRngSource),
            metrics: Arc::new(GameMetrics::new()),
        }
    }

    pub fn with_ranking(mut self, ranking: RankingTable) -> Self {
        self.ranking = ranking;
        self
    }

    pub fn with_persistence(mut self, persistence: Arc<dyn PersistencePort>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationPort>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Override the clock (useful for testing)
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Override the random source (useful for testing)
    pub fn with_uniform_source(mut self, source: Arc<dyn UniformSource>) -> Self {
        self.source = source;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<GameMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn build(self) -> CrashResult<RoundEngine> {
        let persistence = self
            .persistence
            .ok_or_else(|| ConfigurationError::MissingRequired("persistence".to_string()))?;
        let notifier = self
            .notifier
            .ok_or_else(|| ConfigurationError::MissingRequired("notifier".to_string()))?;

        self.config.validate()?;

        Ok(RoundEngine {
            curve: CrashCurve::new(self.config.acceleration),
            generator: Arc::new(OutcomeGenerator::new(&self.config, self.source)),
            ranking: Arc::new(self.ranking),
            registry: Arc::new(SessionRegistry::new()),
            streaks: Arc::new(DashMap::new()),
            persistence,
            notifier,
            clock: self.clock,
            metrics: self.metrics,
        })
    }
}
