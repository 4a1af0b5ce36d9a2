//! Configurable severity cutoffs for the structural rules

use serde::{Deserialize, Serialize};
use thiserror::Error;

use riskintel_core::Severity;

/// Errors raised by an invalid threshold configuration
#[derive(Debug, Error, PartialEq)]
pub enum ThresholdError {
    #[error("threshold {name}.{tier} is not a finite number")]
    NonFinite { name: String, tier: &'static str },

    #[error("threshold {name}.{tier} is negative: {value}")]
    Negative {
        name: String,
        tier: &'static str,
        value: f64,
    },

    #[error("thresholds for {name} are not ordered from critical to low")]
    NotMonotonic { name: String },
}

/// Which side of a cutoff triggers a tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Fires when the value is at or above the cutoff
    #[default]
    AtLeast,
    /// Fires when the value is strictly below the cutoff
    Below,
}

impl Direction {
    fn met(&self, value: f64, cutoff: f64) -> bool {
        match self {
            Self::AtLeast => value >= cutoff,
            Self::Below => value < cutoff,
        }
    }
}

/// Optional cutoff per severity tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tiers {
    pub direction: Direction,
    pub critical: Option<f64>,
    pub high: Option<f64>,
    pub medium: Option<f64>,
    pub low: Option<f64>,
}

impl Tiers {
    pub fn at_least() -> Self {
        Self::default()
    }

    pub fn below() -> Self {
        Self {
            direction: Direction::Below,
            ..Self::default()
        }
    }

    pub fn critical(mut self, cutoff: f64) -> Self {
        self.critical = Some(cutoff);
        self
    }

    pub fn high(mut self, cutoff: f64) -> Self {
        self.high = Some(cutoff);
        self
    }

    pub fn medium(mut self, cutoff: f64) -> Self {
        self.medium = Some(cutoff);
        self
    }

    pub fn low(mut self, cutoff: f64) -> Self {
        self.low = Some(cutoff);
        self
    }

    fn cutoffs(&self) -> [(Severity, Option<f64>); 4] {
        [
            (Severity::Critical, self.critical),
            (Severity::High, self.high),
            (Severity::Medium, self.medium),
            (Severity::Low, self.low),
        ]
    }

    /// Highest tier whose cutoff the value meets
    pub fn classify(&self, value: f64) -> Option<Severity> {
        self.cutoffs()
            .into_iter()
            .find_map(|(severity, cutoff)| match cutoff {
                Some(c) if self.direction.met(value, c) => Some(severity),
                _ => None,
            })
    }

    pub fn validate(&self, name: &str) -> Result<(), ThresholdError> {
        let mut previous: Option<f64> = None;
        for (severity, cutoff) in self.cutoffs() {
            let Some(value) = cutoff else { continue };
            let tier = severity.as_str();
            if !value.is_finite() {
                return Err(ThresholdError::NonFinite {
                    name: name.to_string(),
                    tier,
                });
            }
            if value < 0.0 {
                return Err(ThresholdError::Negative {
                    name: name.to_string(),
                    tier,
                    value,
                });
            }
            if let Some(prev) = previous {
                let ordered = match self.direction {
                    Direction::AtLeast => prev >= value,
                    Direction::Below => prev <= value,
                };
                if !ordered {
                    return Err(ThresholdError::NotMonotonic {
                        name: name.to_string(),
                    });
                }
            }
            previous = Some(value);
        }
        Ok(())
    }
}

/// Cutoffs for every structural rule
///
/// Shares are percentages, other values are amounts in the base currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Share of financial assets held at one custodian
    pub custodian_share: Tiers,
    /// Share of financial and crypto assets under one jurisdiction
    pub jurisdiction_share: Tiers,
    /// Share of financial assets in life insurance
    pub life_insurance_share: Tiers,
    /// Deposit guarantee ceiling per custodian
    pub deposit_guarantee_ceiling: f64,
    /// Contribution ceiling of an equity savings plan
    pub pea_ceiling: f64,
    /// Amount held in flat-taxed brokerage accounts
    pub brokerage_exposure: Tiers,
    /// Share of financial assets invested in equities
    pub equity_share: Tiers,
    /// Cash available on deposit accounts
    pub liquidity: Tiers,
    /// Share of all assets exposed to a foreign currency
    pub currency_share: Tiers,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            custodian_share: Tiers::at_least().critical(50.0).high(30.0),
            jurisdiction_share: Tiers::at_least().critical(80.0).high(60.0),
            life_insurance_share: Tiers::at_least().critical(25.0).high(15.0).medium(0.0),
            deposit_guarantee_ceiling: 100_000.0,
            pea_ceiling: 150_000.0,
            brokerage_exposure: Tiers::at_least().medium(50_000.0),
            equity_share: Tiers::at_least().medium(70.0),
            liquidity: Tiers::below().critical(5_000.0).medium(15_000.0),
            currency_share: Tiers::at_least().high(20.0).medium(10.0).low(3.0),
        }
    }
}

impl ThresholdConfig {
    pub fn validate(&self) -> Result<(), ThresholdError> {
        let tiers = [
            ("custodian_share", &self.custodian_share),
            ("jurisdiction_share", &self.jurisdiction_share),
            ("life_insurance_share", &self.life_insurance_share),
            ("brokerage_exposure", &self.brokerage_exposure),
            ("equity_share", &self.equity_share),
            ("liquidity", &self.liquidity),
            ("currency_share", &self.currency_share),
        ];
        for (name, tier) in tiers {
            tier.validate(name)?;
        }

        for (name, value) in [
            ("deposit_guarantee_ceiling", self.deposit_guarantee_ceiling),
            ("pea_ceiling", self.pea_ceiling),
        ] {
            if !value.is_finite() {
                return Err(ThresholdError::NonFinite {
                    name: name.to_string(),
                    tier: "ceiling",
                });
            }
            if value < 0.0 {
                return Err(ThresholdError::Negative {
                    name: name.to_string(),
                    tier: "ceiling",
                    value,
                });
            }
        }
        Ok(())
    }
}
