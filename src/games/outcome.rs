//! Crash point sampling
//!
//! A crash point is `1 / U` for `U` uniform in `(0, 1]`, compressed by the
//! house edge in real-money mode and capped at the configured maximum win.

use crate::common::types::{round_cents, Wallet};
use crate::config::GameConfig;
use crate::errors::RoundError;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Source of uniform draws in `[0, 1)`
///
/// A draw of exactly zero is rejected and redrawn by the generator.
pub trait UniformSource: Send + Sync {
    fn draw(&self) -> f64;
}

/// Thread-local OS-seeded generator
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngSource;

impl UniformSource for ThreadRngSource {
    fn draw(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// Reproducible generator for simulations
pub struct SeededSource {
    rng: Mutex<StdRng>,
}

impl SeededSource {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl UniformSource for SeededSource {
    fn draw(&self) -> f64 {
        self.rng
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .gen::<f64>()
    }
}

/// Replays a fixed list of draws, then yields zero forever
pub struct ScriptedSource {
    draws: Mutex<VecDeque<f64>>,
}

impl ScriptedSource {
    pub fn new(draws: impl IntoIterator<Item = f64>) -> Self {
        Self {
            draws: Mutex::new(draws.into_iter().collect()),
        }
    }

    /// Queue the draw that yields `crash` in virtual mode
    pub fn push_crash(&self, crash: f64) {
        self.draws
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(1.0 / crash);
    }
}

impl UniformSource for ScriptedSource {
    fn draw(&self) -> f64 {
        self.draws
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or(0.0)
    }
}

/// Samples the crash multiplier for a new round
pub struct OutcomeGenerator {
    source: Arc<dyn UniformSource>,
    edge_factor: f64,
    max_win: f64,
    retry_budget: u32,
}

impl OutcomeGenerator {
    pub fn new(config: &GameConfig, source: Arc<dyn UniformSource>) -> Self {
        Self {
            source,
            edge_factor: config.edge_factor,
            max_win: config.max_win,
            retry_budget: config.rng_retry_budget,
        }
    }

    /// Crash multiplier in `[1, max_win]`, rounded to hundredths
    pub fn sample(&self, wallet: Wallet) -> Result<f64, RoundError> {
        let u = self.draw_nonzero()?;
        let mut raw = 1.0 / u;

        if wallet.is_real() {
            raw = 1.0 + (raw - 1.0) * self.edge_factor;
        }

        Ok(round_cents(raw).clamp(1.0, self.max_win))
    }

    fn draw_nonzero(&self) -> Result<f64, RoundError> {
        for _ in 0..self.retry_budget {
            let u = self.source.draw();
            if u > 0.0 && u <= 1.0 {
                return Ok(u);
            }
        }
        Err(RoundError::RngExhausted(self.retry_budget))
    }
}
