//! Shared type definitions for the crash game
//!
//! These are the values handed to the persistence and notification
//! collaborators, so they are all serde-serializable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Player identifier as issued by the account collaborator
pub type PlayerId = String;

/// The two independent ledgers every player holds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Wallet {
    Real,
    Virtual,
}

impl Wallet {
    pub fn from_is_real(is_real: bool) -> Self {
        if is_real {
            Wallet::Real
        } else {
            Wallet::Virtual
        }
    }

    pub fn is_real(&self) -> bool {
        matches!(self, Wallet::Real)
    }
}

impl fmt::Display for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Wallet::Real => write!(f, "real"),
            Wallet::Virtual => write!(f, "virtual"),
        }
    }
}

/// Public view of a running round, safe to push to the player.
///
/// Deliberately carries no crash multiplier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundTicket {
    pub round_id: Uuid,
    pub player_id: PlayerId,
    pub wallet: Wallet,
    pub bet_amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_stop: Option<f64>,
    pub started_at: DateTime<Utc>,
}

/// One entry of a player's game history
///
/// A win records the cash-out multiplier in `stop` and no crash point; a loss
/// records the crash point and no stop. The absent side serializes as `"x"`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryRecord {
    pub date: DateTime<Utc>,
    #[serde(with = "x_marker")]
    pub crash: Option<f64>,
    pub bet: f64,
    #[serde(with = "x_marker")]
    pub stop: Option<f64>,
    pub profit: f64,
}

impl HistoryRecord {
    pub fn is_win(&self) -> bool {
        self.crash.is_none()
    }
}

/// Per-wallet game counts derived from history
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistorySummary {
    pub games: usize,
    pub wins: usize,
    pub losses: usize,
}

impl HistorySummary {
    pub fn from_records(records: &[HistoryRecord]) -> Self {
        let wins = records.iter().filter(|r| r.crash.is_none()).count();
        let losses = records.iter().filter(|r| r.stop.is_none()).count();
        Self {
            games: records.len(),
            wins,
            losses,
        }
    }
}

/// Round a multiplier or amount to hundredths
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

mod x_marker {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    const MARKER: &str = "x";

    pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_f64(*v),
            None => serializer.serialize_str(MARKER),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Value(f64),
            Marker(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Value(v) => Ok(Some(v)),
            Raw::Marker(m) if m == MARKER => Ok(None),
            Raw::Marker(m) => Err(D::Error::custom(format!("unexpected history marker '{}'", m))),
        }
    }
}
