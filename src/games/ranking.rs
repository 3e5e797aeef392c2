use crate::errors::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One row of the ranking table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankingTier {
    pub lower_bound: f64,
    pub label: String,
}

impl RankingTier {
    pub fn new(lower_bound: f64, label: &str) -> Self {
        Self {
            lower_bound,
            label: label.to_string(),
        }
    }
}

/// Ordered tier table looked up by cumulative earnings
#[derive(Debug, Clone, PartialEq)]
pub struct RankingTable {
    tiers: Vec<RankingTier>,
}

impl RankingTable {
    /// Tiers must be non-empty and strictly ascending by lower bound
    pub fn new(tiers: Vec<RankingTier>) -> Result<Self, ConfigurationError> {
        if tiers.is_empty() {
            return Err(ConfigurationError::MissingRequired("ranking.tiers".to_string()));
        }
        for pair in tiers.windows(2) {
            if pair[1].lower_bound.partial_cmp(&pair[0].lower_bound) != Some(Ordering::Greater) {
                return Err(ConfigurationError::invalid(
                    "ranking.tiers",
                    &pair[1].label,
                    "lower bounds must be strictly ascending",
                ));
            }
        }
        Ok(Self { tiers })
    }

    /// Label of the highest tier whose lower bound `earnings` reaches.
    /// Earnings below the first bound get the first tier.
    pub fn tier_for(&self, earnings: f64) -> &str {
        self.tiers
            .iter()
            .rev()
            .find(|tier| earnings >= tier.lower_bound)
            .unwrap_or(&self.tiers[0])
            .label
            .as_str()
    }
}

pub fn default_tiers() -> Vec<RankingTier> {
    vec![
        RankingTier::new(0.0, "Rookie"),
        RankingTier::new(100.0, "Pilot"),
        RankingTier::new(1_000.0, "Captain"),
        RankingTier::new(10_000.0, "Commander"),
        RankingTier::new(100_000.0, "Legend"),
    ]
}

impl Default for RankingTable {
    fn default() -> Self {
        Self { tiers: default_tiers() }
    }
}
