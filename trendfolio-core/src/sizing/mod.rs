//! Position sizing: how much capital a new entry receives.
//!
//! A policy turns an entry signal's strength (and the current regime, when
//! the policy uses one) into a dollar allocation. The ledger then buys
//! `floor(allocation / price)` whole shares; zero shares means no entry.

pub mod regime;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
pub use regime::{detect, Regime, RegimeParams, RegimeReading};

/// Strength threshold and allocation multiplier for tiered sizing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizingTier {
    pub min_strength: f64,
    pub multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SizingPolicy {
    /// Same dollar amount for every entry.
    Fixed { amount: f64 },

    /// `base_amount` scaled by the highest tier whose threshold the signal
    /// strength meets. Below every tier, the entry is skipped.
    Tiered {
        base_amount: f64,
        #[serde(default = "default_tiers")]
        tiers: Vec<SizingTier>,
    },

    /// `base_amount` scaled by market-breadth exposure.
    RegimeAdjusted {
        base_amount: f64,
        #[serde(default)]
        regime: RegimeParams,
        #[serde(default = "default_block_in_bear")]
        block_entries_in_bear: bool,
    },
}

impl Default for SizingPolicy {
    fn default() -> Self {
        Self::Fixed { amount: 10_000.0 }
    }
}

pub fn default_tiers() -> Vec<SizingTier> {
    [(5.0, 2.0), (3.0, 1.5), (2.0, 1.2), (1.0, 1.0)]
        .into_iter()
        .map(|(min_strength, multiplier)| SizingTier {
            min_strength,
            multiplier,
        })
        .collect()
}

fn default_block_in_bear() -> bool {
    true
}

impl SizingPolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Fixed { amount } => positive("sizing.amount", *amount),
            Self::Tiered { base_amount, tiers } => {
                positive("sizing.base_amount", *base_amount)?;
                if tiers.is_empty() {
                    return Err(ConfigError::EmptyTiers);
                }
                for tier in tiers {
                    positive("sizing.tiers.multiplier", tier.multiplier)?;
                    if !tier.min_strength.is_finite() {
                        return Err(ConfigError::InvalidAmount {
                            name: "sizing.tiers.min_strength",
                            value: tier.min_strength,
                        });
                    }
                }
                Ok(())
            }
            Self::RegimeAdjusted {
                base_amount,
                regime,
                ..
            } => {
                positive("sizing.base_amount", *base_amount)?;
                regime.validate()
            }
        }
    }

    /// Regime parameters, if this policy needs a breadth reading.
    pub fn regime_params(&self) -> Option<&RegimeParams> {
        match self {
            Self::RegimeAdjusted { regime, .. } => Some(regime),
            _ => None,
        }
    }

    /// Dollar allocation for an entry of the given strength. `0.0` means skip.
    pub fn allocation(&self, strength: f64, regime: Option<&RegimeReading>) -> f64 {
        match self {
            Self::Fixed { amount } => *amount,
            Self::Tiered { base_amount, tiers } => tiers
                .iter()
                .filter(|t| strength >= t.min_strength)
                .max_by(|a, b| a.min_strength.total_cmp(&b.min_strength))
                .map_or(0.0, |t| base_amount * t.multiplier),
            Self::RegimeAdjusted {
                base_amount,
                block_entries_in_bear,
                ..
            } => match regime {
                Some(r) if r.is_bear() && *block_entries_in_bear => 0.0,
                Some(r) => base_amount * r.exposure,
                None => *base_amount,
            },
        }
    }
}

/// Whole shares purchasable with `allocation` at `price`.
pub fn share_count(allocation: f64, price: f64) -> u64 {
    if !(allocation > 0.0 && price > 0.0) || !allocation.is_finite() {
        return 0;
    }
    (allocation / price).floor() as u64
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidAmount { name, value })
    }
}
