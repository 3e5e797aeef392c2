use crate::common::types::{HistoryRecord, PlayerId, RoundTicket, Wallet};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use uuid::Uuid;

/// How a winning round was cashed out
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CashOutKind {
    Manual,
    Auto,
}

/// Terminal outcome of a round
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "via", rename_all = "snake_case")]
pub enum RoundOutcome {
    Crashed,
    CashedOut(CashOutKind),
}

impl RoundOutcome {
    pub fn is_win(&self) -> bool {
        matches!(self, RoundOutcome::CashedOut(_))
    }
}

impl fmt::Display for RoundOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundOutcome::Crashed => write!(f, "crashed"),
            RoundOutcome::CashedOut(CashOutKind::Manual) => write!(f, "cashed out (manual)"),
            RoundOutcome::CashedOut(CashOutKind::Auto) => write!(f, "cashed out (auto)"),
        }
    }
}

/// Decided result of a round
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Resolution {
    pub outcome: RoundOutcome,
    /// Cash-out multiplier on a win, crash point on a loss
    pub at_multiplier: f64,
    pub profit: f64,
}

/// A running round
///
/// Resolving consumes the round, so a round can only ever be resolved once.
#[derive(Debug, Clone)]
pub struct Round {
    ticket: RoundTicket,
    crash_multiplier: f64,
    started_at: Instant,
}

impl Round {
    pub fn new(
        player_id: PlayerId,
        wallet: Wallet,
        bet_amount: f64,
        auto_stop: Option<f64>,
        crash_multiplier: f64,
        started_at: Instant,
    ) -> Self {
        Self {
            ticket: RoundTicket {
                round_id: Uuid::new_v4(),
                player_id,
                wallet,
                bet_amount,
                auto_stop,
                started_at: Utc::now(),
            },
            crash_multiplier,
            started_at,
        }
    }

    pub fn id(&self) -> Uuid {
        self.ticket.round_id
    }

    pub fn player_id(&self) -> &str {
        &self.ticket.player_id
    }

    pub fn ticket(&self) -> &RoundTicket {
        &self.ticket
    }

    pub fn bet_amount(&self) -> f64 {
        self.ticket.bet_amount
    }

    pub fn crash_multiplier(&self) -> f64 {
        self.crash_multiplier
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Outcome the round reaches on its own if nobody stops it
    pub fn scheduled_outcome(&self) -> (RoundOutcome, f64) {
        match self.ticket.auto_stop {
            Some(target) if self.crash_multiplier >= target => {
                (RoundOutcome::CashedOut(CashOutKind::Auto), target)
            }
            _ => (RoundOutcome::Crashed, self.crash_multiplier),
        }
    }

    pub fn resolve(self, resolution: Resolution) -> ResolvedRound {
        ResolvedRound {
            ticket: self.ticket,
            crash_multiplier: self.crash_multiplier,
            resolution,
        }
    }
}

/// An immutable, resolved round
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolvedRound {
    pub ticket: RoundTicket,
    pub crash_multiplier: f64,
    pub resolution: Resolution,
}

impl ResolvedRound {
    pub fn is_win(&self) -> bool {
        self.resolution.outcome.is_win()
    }

    /// A win that reached the player's declared auto-stop target
    pub fn reached_target(&self) -> bool {
        match self.ticket.auto_stop {
            Some(target) => self.is_win() && self.resolution.at_multiplier >= target,
            None => false,
        }
    }

    pub fn history_record(&self) -> HistoryRecord {
        let (crash, stop) = if self.is_win() {
            (None, Some(self.resolution.at_multiplier))
        } else {
            (Some(self.crash_multiplier), None)
        };

        HistoryRecord {
            date: Utc::now(),
            crash,
            bet: self.ticket.bet_amount,
            stop,
            profit: self.resolution.profit,
        }
    }
}
