//! Portfolio snapshot supplied by the upstream normalization stage
//!
//! The snapshot is created once per run and never mutated by the engine.
//! All derived views below are deterministic: maps that feed rule output
//! are `BTreeMap`s so iteration order never depends on hashing.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

use crate::DEFAULT_BASE_CURRENCY;

/// Errors raised when a snapshot cannot be analyzed
#[derive(Debug, Error, PartialEq)]
pub enum SnapshotError {
    #[error("custodian #{0} has an empty name")]
    EmptyCustodianName(usize),

    #[error("duplicate custodian name: {0}")]
    DuplicateCustodian(String),

    #[error("invalid amount for {field}: {value}")]
    InvalidAmount { field: String, value: f64 },
}

/// Kind of account held at a custodian
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    /// Current / checking account
    Current,
    /// Regulated savings account
    Savings,
    /// Term deposit
    TermDeposit,
    /// Life insurance wrapper
    LifeInsurance,
    /// Equity savings plan
    Pea,
    /// Equity savings plan for small and mid caps
    PeaPme,
    /// Ordinary brokerage account
    Brokerage,
    /// Retirement plan
    Retirement,
    /// Anything else
    Other,
}

impl AccountKind {
    /// Cash-like deposits covered by a deposit guarantee scheme
    pub fn is_deposit(&self) -> bool {
        matches!(self, Self::Current | Self::Savings | Self::TermDeposit)
    }

    /// Accounts fully invested in equities
    pub fn is_equity_wrapper(&self) -> bool {
        matches!(self, Self::Pea | Self::PeaPme | Self::Brokerage)
    }
}

/// A fund line inside a life insurance contract
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fund {
    pub name: String,
    pub amount: f64,
    /// Capital-guaranteed fund (not exposed to equity markets)
    #[serde(default)]
    pub guaranteed: bool,
}

/// A single account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub kind: AccountKind,
    #[serde(default)]
    pub label: String,
    pub amount: f64,
    /// ISO currency code; `None` means the snapshot base currency
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub funds: Vec<Fund>,
}

/// An institution holding financial assets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Custodian {
    pub name: String,
    pub jurisdiction: String,
    pub total: f64,
    #[serde(default)]
    pub accounts: Vec<Account>,
}

/// A crypto-asset platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoPlatform {
    pub name: String,
    pub jurisdiction: String,
    pub total: f64,
}

/// A real estate holding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub kind: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    /// Country of the property; empty means the base country
    #[serde(default)]
    pub country: String,
    pub value: f64,
}

/// The active investor profile
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvestorProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub risk_tolerance: String,
    #[serde(default)]
    pub monthly_expenses: Option<f64>,
}

/// Aggregated holdings of one person at one point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
    #[serde(default = "default_base_country")]
    pub base_country: String,
    #[serde(default)]
    pub profile: InvestorProfile,
    #[serde(default)]
    pub custodians: Vec<Custodian>,
    #[serde(default)]
    pub crypto: Vec<CryptoPlatform>,
    #[serde(default)]
    pub real_estate: Vec<Property>,
    #[serde(default)]
    pub precious_metals_total: f64,
}

fn default_base_currency() -> String {
    DEFAULT_BASE_CURRENCY.to_string()
}

fn default_base_country() -> String {
    "FR".to_string()
}

impl Default for PortfolioSnapshot {
    fn default() -> Self {
        Self {
            base_currency: default_base_currency(),
            base_country: default_base_country(),
            profile: InvestorProfile::default(),
            custodians: Vec::new(),
            crypto: Vec::new(),
            real_estate: Vec::new(),
            precious_metals_total: 0.0,
        }
    }
}

fn check_amount(field: impl FnOnce() -> String, value: f64) -> Result<(), SnapshotError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SnapshotError::InvalidAmount {
            field: field(),
            value,
        })
    }
}

impl PortfolioSnapshot {
    /// Reject snapshots the structural rules cannot evaluate meaningfully
    pub fn validate(&self) -> Result<(), SnapshotError> {
        let mut seen = HashSet::new();

        for (idx, custodian) in self.custodians.iter().enumerate() {
            if custodian.name.trim().is_empty() {
                return Err(SnapshotError::EmptyCustodianName(idx));
            }
            if !seen.insert(custodian.name.to_lowercase()) {
                return Err(SnapshotError::DuplicateCustodian(custodian.name.clone()));
            }
            check_amount(|| format!("{}.total", custodian.name), custodian.total)?;

            for account in &custodian.accounts {
                check_amount(
                    || format!("{}.{:?}.amount", custodian.name, account.kind),
                    account.amount,
                )?;
                for fund in &account.funds {
                    check_amount(|| format!("{}.fund[{}]", custodian.name, fund.name), fund.amount)?;
                }
            }
        }

        for platform in &self.crypto {
            check_amount(|| format!("crypto.{}.total", platform.name), platform.total)?;
        }
        for property in &self.real_estate {
            check_amount(|| format!("real_estate.{}.value", property.kind), property.value)?;
        }
        check_amount(|| "precious_metals_total".to_string(), self.precious_metals_total)?;

        Ok(())
    }

    /// Sum of custodian totals
    pub fn financial_total(&self) -> f64 {
        self.custodians.iter().map(|c| c.total).sum()
    }

    pub fn crypto_total(&self) -> f64 {
        self.crypto.iter().map(|p| p.total).sum()
    }

    pub fn real_estate_total(&self) -> f64 {
        self.real_estate.iter().map(|p| p.value).sum()
    }

    /// Everything the person holds
    pub fn grand_total(&self) -> f64 {
        self.financial_total()
            + self.crypto_total()
            + self.real_estate_total()
            + self.precious_metals_total
    }

    fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.custodians.iter().flat_map(|c| c.accounts.iter())
    }

    /// Share of the financial total held at one custodian, in percent
    pub fn custodian_share(&self, name: &str) -> Option<f64> {
        let total = self.financial_total();
        if total <= 0.0 {
            return None;
        }
        self.custodians
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.total / total * 100.0)
    }

    /// Financial and crypto holdings grouped by jurisdiction
    pub fn jurisdiction_totals(&self) -> BTreeMap<String, f64> {
        let mut totals = BTreeMap::new();
        for custodian in &self.custodians {
            *totals.entry(custodian.jurisdiction.clone()).or_insert(0.0) += custodian.total;
        }
        for platform in &self.crypto {
            *totals.entry(platform.jurisdiction.clone()).or_insert(0.0) += platform.total;
        }
        totals
    }

    /// Largest custodian by total (first one wins on ties)
    pub fn top_custodian(&self) -> Option<&Custodian> {
        self.custodians.iter().fold(None, |best: Option<&Custodian>, c| match best {
            Some(b) if b.total >= c.total => Some(b),
            _ => Some(c),
        })
    }

    /// Largest jurisdiction by amount (alphabetical first on ties)
    pub fn top_jurisdiction(&self) -> Option<(String, f64)> {
        self.jurisdiction_totals()
            .into_iter()
            .fold(None, |best: Option<(String, f64)>, (j, v)| match best {
                Some(b) if b.1 >= v => Some(b),
                _ => Some((j, v)),
            })
    }

    /// Amount invested in equities: equity wrappers plus unit-linked life insurance funds
    pub fn equity_exposure(&self) -> f64 {
        self.accounts()
            .map(|account| {
                if account.kind.is_equity_wrapper() {
                    account.amount
                } else if account.kind == AccountKind::LifeInsurance {
                    account
                        .funds
                        .iter()
                        .filter(|f| !f.guaranteed)
                        .map(|f| f.amount)
                        .sum()
                } else {
                    0.0
                }
            })
            .sum()
    }

    pub fn life_insurance_total(&self) -> f64 {
        self.accounts()
            .filter(|a| a.kind == AccountKind::LifeInsurance)
            .map(|a| a.amount)
            .sum()
    }

    /// Guarantee-eligible deposits held at one custodian
    pub fn deposits_at(&self, custodian: &Custodian) -> f64 {
        custodian
            .accounts
            .iter()
            .filter(|a| a.kind.is_deposit())
            .map(|a| a.amount)
            .sum()
    }

    /// Cash available without selling anything
    pub fn liquid_cash(&self) -> f64 {
        self.accounts()
            .filter(|a| a.kind.is_deposit())
            .map(|a| a.amount)
            .sum()
    }

    /// Holdings in ordinary brokerage accounts
    pub fn brokerage_total(&self) -> f64 {
        self.accounts()
            .filter(|a| a.kind == AccountKind::Brokerage)
            .map(|a| a.amount)
            .sum()
    }

    fn is_foreign_currency(&self, account: &Account) -> bool {
        account
            .currency
            .as_deref()
            .is_some_and(|c| !c.eq_ignore_ascii_case(&self.base_currency))
    }

    /// Breakdown of holdings not denominated in the base currency
    pub fn foreign_currency_exposure(&self) -> CurrencyExposure {
        let accounts = self
            .accounts()
            .filter(|a| self.is_foreign_currency(a))
            .map(|a| a.amount)
            .sum();
        let real_estate = self
            .real_estate
            .iter()
            .filter(|p| !p.country.is_empty() && !p.country.eq_ignore_ascii_case(&self.base_country))
            .map(|p| p.value)
            .sum();

        CurrencyExposure {
            accounts,
            crypto: self.crypto_total(),
            real_estate,
        }
    }
}

/// Foreign currency exposure by source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrencyExposure {
    pub accounts: f64,
    pub crypto: f64,
    pub real_estate: f64,
}

impl CurrencyExposure {
    pub fn total(&self) -> f64 {
        self.accounts + self.crypto + self.real_estate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(kind: AccountKind, amount: f64) -> Account {
        Account {
            kind,
            label: String::new(),
            amount,
            currency: None,
            funds: Vec::new(),
        }
    }

    fn sample() -> PortfolioSnapshot {
        let mut life = account(AccountKind::LifeInsurance, 40_000.0);
        life.funds = vec![
            Fund { name: "Euro fund".into(), amount: 25_000.0, guaranteed: true },
            Fund { name: "World equity".into(), amount: 15_000.0, guaranteed: false },
        ];
        let mut usd = account(AccountKind::Brokerage, 10_000.0);
        usd.currency = Some("USD".into());

        PortfolioSnapshot {
            custodians: vec![
                Custodian {
                    name: "Bank X".into(),
                    jurisdiction: "FR".into(),
                    total: 60_000.0,
                    accounts: vec![account(AccountKind::Savings, 20_000.0), life],
                },
                Custodian {
                    name: "Broker Y".into(),
                    jurisdiction: "IE".into(),
                    total: 40_000.0,
                    accounts: vec![account(AccountKind::Pea, 30_000.0), usd],
                },
            ],
            crypto: vec![CryptoPlatform {
                name: "Exchange Z".into(),
                jurisdiction: "IE".into(),
                total: 5_000.0,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_totals_and_shares() {
        let snapshot = sample();
        assert_eq!(snapshot.financial_total(), 100_000.0);
        assert_eq!(snapshot.grand_total(), 105_000.0);
        assert_eq!(snapshot.custodian_share("Bank X"), Some(60.0));
        assert_eq!(snapshot.custodian_share("Nobody"), None);

        let jurisdictions = snapshot.jurisdiction_totals();
        assert_eq!(jurisdictions["FR"], 60_000.0);
        assert_eq!(jurisdictions["IE"], 45_000.0);
        assert_eq!(snapshot.top_jurisdiction().map(|(j, _)| j), Some("FR".to_string()));
        assert_eq!(snapshot.top_custodian().map(|c| c.name.as_str()), Some("Bank X"));
    }

    #[test]
    fn test_exposure_views() {
        let snapshot = sample();
        // PEA + brokerage + unit-linked fund
        assert_eq!(snapshot.equity_exposure(), 55_000.0);
        assert_eq!(snapshot.life_insurance_total(), 40_000.0);
        assert_eq!(snapshot.liquid_cash(), 20_000.0);
        assert_eq!(snapshot.brokerage_total(), 10_000.0);

        let fx = snapshot.foreign_currency_exposure();
        assert_eq!(fx.accounts, 10_000.0);
        assert_eq!(fx.crypto, 5_000.0);
        assert_eq!(fx.total(), 15_000.0);
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        let mut snapshot = sample();
        assert!(snapshot.validate().is_ok());

        snapshot.custodians[1].name = "bank x".into();
        assert_eq!(
            snapshot.validate(),
            Err(SnapshotError::DuplicateCustodian("bank x".into()))
        );

        let mut snapshot = sample();
        snapshot.custodians[0].total = f64::NAN;
        assert!(matches!(
            snapshot.validate(),
            Err(SnapshotError::InvalidAmount { .. })
        ));

        let mut snapshot = sample();
        snapshot.custodians[0].name = "  ".into();
        assert_eq!(snapshot.validate(), Err(SnapshotError::EmptyCustodianName(0)));
    }

    #[test]
    fn test_deserialize_defaults() {
        let json = r#"{"custodians":[{"name":"A","jurisdiction":"FR","total":10.0}]}"#;
        let snapshot: PortfolioSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.base_currency, "EUR");
        assert!(snapshot.custodians[0].accounts.is_empty());
        assert_eq!(snapshot.grand_total(), 10.0);
    }
}
