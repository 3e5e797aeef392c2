//! End-to-end round scenarios against the in-memory ledger, on virtual and tokio clocks

use crashpoint::common::types::{HistoryRecord, RoundTicket, Wallet};
use crashpoint::config::{GameConfig, LedgerConfig};
use crashpoint::games::achievements::{Task, TaskMethod};
use crashpoint::games::types::{CashOutKind, RoundOutcome};
use crashpoint::games::{RoundEngine, ScriptedSource, StartRequest, UniformSource};
use crashpoint::{InMemoryLedger, ManualClock, NotificationPort, RoundError, TokioClock};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct RecordingNotifier {
    events: Mutex<Vec<(String, &'static str)>>,
}

impl RecordingNotifier {
    fn events_for(&self, player: &str) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == player)
            .map(|(_, e)| *e)
            .collect()
    }
}

impl NotificationPort for RecordingNotifier {
    fn send_started(&self, ticket: &RoundTicket) {
        self.events
            .lock()
            .unwrap()
            .push((ticket.player_id.clone(), "started"));
    }

    fn send_resolved(&self, ticket: &RoundTicket, record: &HistoryRecord) {
        let event = if record.is_win() { "stopped" } else { "crashed" };
        self.events
            .lock()
            .unwrap()
            .push((ticket.player_id.clone(), event));
    }
}

struct Harness {
    engine: RoundEngine,
    clock: Arc<ManualClock>,
    ledger: Arc<InMemoryLedger>,
    notifier: Arc<RecordingNotifier>,
    source: Arc<ScriptedSource>,
}

impl Harness {
    fn new() -> Self {
        Self::with_tasks(Vec::new())
    }

    fn with_tasks(tasks: Vec<Task>) -> Self {
        let clock = Arc::new(ManualClock::new());
        let ledger = Arc::new(InMemoryLedger::new(LedgerConfig::default(), tasks));
        let notifier = Arc::new(RecordingNotifier::default());
        let source = Arc::new(ScriptedSource::new(Vec::new()));

        let engine = RoundEngine::builder(GameConfig::default())
            .with_persistence(ledger.clone())
            .with_notifier(notifier.clone())
            .with_clock(clock.clone())
            .with_uniform_source(source.clone())
            .build()
            .unwrap();

        Self {
            engine,
            clock,
            ledger,
            notifier,
            source,
        }
    }

    async fn start(&self, player: &str, bet: f64, auto_stop: Option<f64>, crash: f64) -> RoundTicket {
        self.source.push_crash(crash);
        self.engine
            .start(StartRequest {
                player_id: player.to_string(),
                bet_amount: bet,
                auto_stop,
                wallet: Wallet::Virtual,
            })
            .await
            .unwrap()
    }

    async fn advance_secs(&self, secs: f64) {
        self.clock.advance(Duration::from_secs_f64(secs)).await;
    }

    fn history(&self, player: &str) -> Vec<HistoryRecord> {
        self.ledger.history(player, Wallet::Virtual).unwrap()
    }
}

#[tokio::test]
async fn test_auto_stop_fires_at_target_time() {
    let h = Harness::new();
    h.start("alice", 10.0, Some(2.0), 2.5).await;

    // 2.0x is reached after sqrt(40) ~ 6.32s
    h.advance_secs(6.3).await;
    assert!(h.engine.active_round("alice").is_some());

    h.advance_secs(0.1).await;
    assert!(h.engine.active_round("alice").is_none());

    let history = h.history("alice");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].stop, Some(2.0));
    assert_eq!(history[0].crash, None);
    assert_eq!(history[0].profit, 10.0);
    assert_eq!(h.ledger.record("alice", Wallet::Virtual).unwrap().balance, 20.0);
    assert_eq!(h.notifier.events_for("alice"), vec!["started", "stopped"]);
}

#[tokio::test]
async fn test_crash_before_target_loses_bet() {
    let h = Harness::new();
    h.start("alice", 10.0, Some(3.0), 2.5).await;

    // 2.5x is reached after sqrt(60) ~ 7.75s
    h.advance_secs(7.7).await;
    assert!(h.engine.active_round("alice").is_some());
    h.advance_secs(0.1).await;

    let history = h.history("alice");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].crash, Some(2.5));
    assert_eq!(history[0].stop, None);
    assert_eq!(history[0].profit, -10.0);
    assert_eq!(h.ledger.record("alice", Wallet::Virtual).unwrap().balance, 0.0);
    assert_eq!(h.notifier.events_for("alice"), vec!["started", "crashed"]);
}

#[tokio::test]
async fn test_manual_stop_cancels_scheduled_crash() {
    let h = Harness::new();
    h.start("alice", 10.0, None, 5.0).await;

    h.advance_secs(4.0).await;
    let settlement = h.engine.stop("alice").await.unwrap();

    assert_eq!(
        settlement.round.resolution.outcome,
        RoundOutcome::CashedOut(CashOutKind::Manual)
    );
    assert_eq!(settlement.record.stop, Some(1.4));
    assert_eq!(settlement.record.profit, 4.0);
    assert_eq!(h.clock.pending_count(), 0);

    // The crash at ~12.65s must never fire
    h.advance_secs(30.0).await;
    assert_eq!(h.history("alice").len(), 1);
    assert_eq!(h.ledger.record("alice", Wallet::Virtual).unwrap().balance, 14.0);
}

#[tokio::test]
async fn test_second_start_is_rejected() {
    let h = Harness::new();
    let first = h.start("alice", 1.0, None, 3.0).await;

    h.source.push_crash(4.0);
    let second = h
        .engine
        .start(StartRequest {
            player_id: "alice".to_string(),
            bet_amount: 1.0,
            auto_stop: None,
            wallet: Wallet::Virtual,
        })
        .await;

    assert_eq!(second, Err(RoundError::AlreadyActive("alice".to_string())));
    assert_eq!(h.engine.active_round("alice").unwrap().round_id, first.round_id);
    assert_eq!(h.clock.pending_count(), 1);
}

#[tokio::test]
async fn test_stop_without_round_is_rejected() {
    let h = Harness::new();
    assert!(matches!(
        h.engine.stop("nobody").await,
        Err(RoundError::NotActive(_))
    ));

    h.start("alice", 1.0, None, 1.5).await;
    h.advance_secs(10.0).await;
    assert!(matches!(
        h.engine.stop("alice").await,
        Err(RoundError::NotActive(_))
    ));
    assert_eq!(h.history("alice").len(), 1);
}

#[tokio::test]
async fn test_stop_racing_timer_resolves_once() {
    let h = Harness::new();
    h.start("alice", 1.0, None, 2.0).await;

    let (stopped, _) = tokio::join!(h.engine.stop("alice"), h.advance_secs(20.0));

    assert!(stopped.is_ok());
    assert_eq!(h.history("alice").len(), 1);
    assert_eq!(h.notifier.events_for("alice"), vec!["started", "stopped"]);
}

#[tokio::test]
async fn test_streak_task_unlocks_on_third_target_hit() {
    let h = Harness::with_tasks(vec![Task {
        index: 1,
        method: TaskMethod::Streak,
        limit: 3.0,
    }]);

    for n in 1..=3 {
        h.start("alice", 1.0, Some(1.5), 2.0).await;
        h.advance_secs(10.0).await;

        let achieved = h.ledger.record("alice", Wallet::Virtual).unwrap().achieved_tasks;
        assert_eq!(achieved.contains(&1), n == 3, "after round {}", n);
    }
    assert_eq!(h.engine.streak("alice").consecutive_full_successes, 3);
}

#[tokio::test]
async fn test_loss_resets_streak_before_unlock() {
    let h = Harness::with_tasks(vec![Task {
        index: 1,
        method: TaskMethod::Streak,
        limit: 3.0,
    }]);

    for crash in [2.0, 2.0, 1.2, 2.0, 2.0] {
        h.start("alice", 1.0, Some(1.5), crash).await;
        h.advance_secs(10.0).await;
    }

    assert_eq!(h.engine.streak("alice").consecutive_full_successes, 2);
    assert!(h
        .ledger
        .record("alice", Wallet::Virtual)
        .unwrap()
        .achieved_tasks
        .is_empty());
}

#[tokio::test]
async fn test_ranking_tier_follows_earnings() {
    let h = Harness::new();
    h.ledger.deposit("alice", Wallet::Virtual, 90.0);

    h.start("alice", 50.0, Some(3.0), 4.0).await;
    h.advance_secs(15.0).await;

    let record = h.ledger.record("alice", Wallet::Virtual).unwrap();
    assert_eq!(record.cumulative_earnings, 100.0);
    assert_eq!(record.ranking_tier.as_deref(), Some("Pilot"));
}

#[tokio::test]
async fn test_players_resolve_independently() {
    let h = Harness::new();
    h.start("alice", 5.0, Some(2.0), 2.5).await;
    h.start("bob", 5.0, None, 1.5).await;
    assert_eq!(h.engine.active_count(), 2);

    h.advance_secs(5.0).await;
    assert!(h.engine.active_round("alice").is_some());
    assert!(h.engine.active_round("bob").is_none());

    h.advance_secs(5.0).await;
    assert_eq!(h.history("alice")[0].profit, 5.0);
    assert_eq!(h.history("bob")[0].profit, -5.0);

    let snapshot = h.engine.metrics().snapshot();
    assert_eq!(snapshot.rounds_started, 2);
    assert_eq!(snapshot.auto_cash_outs, 1);
    assert_eq!(snapshot.rounds_crashed, 1);
}

#[tokio::test]
async fn test_cancel_all_voids_rounds() {
    let h = Harness::new();
    h.start("alice", 2.0, None, 3.0).await;
    h.start("bob", 2.0, Some(1.5), 3.0).await;

    let voided = h.engine.cancel_all();
    assert_eq!(voided.len(), 2);

    h.advance_secs(60.0).await;
    assert!(h.history("alice").is_empty());
    assert!(h.history("bob").is_empty());
    assert_eq!(h.ledger.record("alice", Wallet::Virtual).unwrap().balance, 10.0);
}

#[tokio::test]
async fn test_real_wallet_applies_house_edge() {
    let h = Harness::new();
    h.ledger.deposit("alice", Wallet::Real, 20.0);

    // Draw 0.5 gives 2.0x raw, compressed to 1.95x for real money
    h.source.push_crash(2.0);
    h.engine
        .start(StartRequest {
            player_id: "alice".to_string(),
            bet_amount: 10.0,
            auto_stop: None,
            wallet: Wallet::Real,
        })
        .await
        .unwrap();
    h.advance_secs(20.0).await;

    let history = h.ledger.history("alice", Wallet::Real).unwrap();
    assert_eq!(history[0].crash, Some(1.95));
    assert_eq!(h.ledger.record("alice", Wallet::Real).unwrap().balance, 10.0);
    assert!(h.ledger.history("alice", Wallet::Virtual).is_err());
}

/// Always draws the same value; 1.0 yields an immediate 1.00x crash
struct FixedSource(f64);

impl UniformSource for FixedSource {
    fn draw(&self) -> f64 {
        self.0
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_start_stop_settles_each_round_once() {
    let ledger = Arc::new(InMemoryLedger::new(LedgerConfig::default(), Vec::new()));
    ledger.deposit("alice", Wallet::Virtual, 1_000_000.0);

    let engine = RoundEngine::builder(GameConfig::default())
        .with_persistence(ledger.clone())
        .with_notifier(Arc::new(RecordingNotifier::default()))
        .with_clock(Arc::new(TokioClock))
        .with_uniform_source(Arc::new(FixedSource(1.0)))
        .build()
        .unwrap();

    let starts = Arc::new(AtomicUsize::new(0));
    let stops = Arc::new(AtomicUsize::new(0));

    for _ in 0..200 {
        let mut tasks = Vec::new();
        for worker in 0..4 {
            let engine = engine.clone();
            let starts = starts.clone();
            let stops = stops.clone();
            tasks.push(tokio::spawn(async move {
                if worker % 2 == 0 {
                    let request = StartRequest {
                        player_id: "alice".to_string(),
                        bet_amount: 1.0,
                        auto_stop: None,
                        wallet: Wallet::Virtual,
                    };
                    if engine.start(request).await.is_ok() {
                        starts.fetch_add(1, Ordering::SeqCst);
                    }
                } else if engine.stop("alice").await.is_ok() {
                    stops.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
    }

    // Zero-delay timers may still be settling
    let started = starts.load(Ordering::SeqCst);
    for _ in 0..200 {
        let settled = ledger.history("alice", Wallet::Virtual).unwrap().len();
        if engine.active_count() == 0 && settled >= started {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert!(started > 0);
    assert!(stops.load(Ordering::SeqCst) <= started);
    assert_eq!(engine.active_count(), 0);
    assert_eq!(ledger.history("alice", Wallet::Virtual).unwrap().len(), started);
}
