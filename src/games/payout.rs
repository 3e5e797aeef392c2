use crate::common::types::round_cents;
use crate::games::types::RoundOutcome;

/// Converts a decided outcome into a net profit figure
///
/// A win pays `bet · (multiplier − 1)` net; a crash loses the whole bet.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayoutCalculator;

impl PayoutCalculator {
    pub fn profit(bet_amount: f64, outcome: RoundOutcome, at_multiplier: f64) -> f64 {
        match outcome {
            RoundOutcome::CashedOut(_) => round_cents(bet_amount * (at_multiplier - 1.0)),
            RoundOutcome::Crashed => -bet_amount,
        }
    }
}
