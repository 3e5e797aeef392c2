use crate::errors::CurveError;
use std::time::Duration;

/// Multiplier growth curve shared by every round
///
/// `m(t) = 1 + a·t²/2`, with `t` in seconds and `a` the configured acceleration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrashCurve {
    acceleration: f64,
}

impl CrashCurve {
    /// `acceleration` must be positive; configuration validation guarantees it.
    pub fn new(acceleration: f64) -> Self {
        Self { acceleration }
    }

    pub fn acceleration(&self) -> f64 {
        self.acceleration
    }

    /// Multiplier reached after `elapsed_secs`
    pub fn multiplier_at(&self, elapsed_secs: f64) -> Result<f64, CurveError> {
        if elapsed_secs < 0.0 || elapsed_secs.is_nan() {
            return Err(CurveError::NegativeElapsed(elapsed_secs));
        }
        Ok(self.multiplier_unchecked(elapsed_secs))
    }

    /// Multiplier reached after a monotonic duration (never negative)
    pub fn multiplier_after(&self, elapsed: Duration) -> f64 {
        self.multiplier_unchecked(elapsed.as_secs_f64())
    }

    /// Seconds until the curve reaches `multiplier`
    pub fn time_for(&self, multiplier: f64) -> Result<f64, CurveError> {
        if multiplier.is_nan() || multiplier < 1.0 {
            return Err(CurveError::MultiplierBelowOne(multiplier));
        }
        Ok((2.0 * (multiplier - 1.0) / self.acceleration).sqrt())
    }

    /// `time_for` as a schedulable delay
    pub fn delay_for(&self, multiplier: f64) -> Result<Duration, CurveError> {
        let secs = self.time_for(multiplier)?;
        Duration::try_from_secs_f64(secs).map_err(|_| CurveError::DelayOutOfRange(multiplier))
    }

    fn multiplier_unchecked(&self, elapsed_secs: f64) -> f64 {
        1.0 + self.acceleration * elapsed_secs * elapsed_secs / 2.0
    }
}
