//! Error types for the crash round engine
//!
//! Round rejections are returned synchronously to the caller of `start`/`stop`.
//! Collaborator failures are kept apart so they never un-decide a round.

use crate::common::types::Wallet;

/// Root error type for crate operations
#[derive(Debug, thiserror::Error)]
pub enum CrashError {
    #[error("Round error: {0}")]
    Round(#[from] RoundError),

    #[error("Curve error: {0}")]
    Curve(#[from] CurveError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Rejections of a start or stop request
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RoundError {
    #[error("Invalid bet amount: {0}")]
    InvalidBet(f64),

    #[error("Invalid auto-stop multiplier: {0}")]
    InvalidAutoStop(f64),

    #[error("Player {0} already has an active round")]
    AlreadyActive(String),

    #[error("Player {0} has no active round")]
    NotActive(String),

    #[error("Random source exhausted after {0} attempts")]
    RngExhausted(u32),

    #[error("Insufficient balance: {available} available, {required} required")]
    InsufficientBalance { available: f64, required: f64 },

    #[error("Balance lookup failed: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Caller errors of the multiplier curve
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum CurveError {
    #[error("Elapsed time cannot be negative: {0}")]
    NegativeElapsed(f64),

    #[error("Multiplier must be at least 1: {0}")]
    MultiplierBelowOne(f64),

    #[error("Multiplier {0} is out of schedulable range")]
    DelayOutOfRange(f64),
}

/// Failures reported by the persistence collaborator
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PersistenceError {
    #[error("No {wallet} account for player {player_id}")]
    AccountNotFound { player_id: String, wallet: Wallet },

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),
}

/// Configuration loading and validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Missing required field: {0}")]
    MissingRequired(String),

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

impl ConfigurationError {
    pub(crate) fn invalid(field: &str, value: impl ToString, reason: &str) -> Self {
        ConfigurationError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Convenience type alias for Results
pub type CrashResult<T> = Result<T, CrashError>;
