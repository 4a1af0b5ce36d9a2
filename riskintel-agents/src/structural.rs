//! Structural risk analysis
//!
//! Pure threshold rules over the portfolio snapshot. No I/O; the same
//! snapshot and thresholds always yield the same records in the same order.

use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

use riskintel_core::{
    AccountKind, Impact, Likelihood, PortfolioSnapshot, RiskCategory, RiskId, RiskRecord,
    Severity, SnapshotError,
};

use crate::{ThresholdConfig, ThresholdError};

/// Errors that make structural analysis impossible
#[derive(Debug, Error, PartialEq)]
pub enum StructuralError {
    #[error("invalid snapshot: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("invalid thresholds: {0}")]
    Thresholds(#[from] ThresholdError),
}

/// Structural rule catalog, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralRule {
    CustodianConcentration,
    JurisdictionConcentration,
    LifeInsuranceLockup,
    DepositGuarantee,
    PeaCeiling,
    BrokerageFlatTax,
    EquityExposure,
    Liquidity,
    CurrencyExposure,
}

impl StructuralRule {
    pub const ALL: [StructuralRule; 9] = [
        Self::CustodianConcentration,
        Self::JurisdictionConcentration,
        Self::LifeInsuranceLockup,
        Self::DepositGuarantee,
        Self::PeaCeiling,
        Self::BrokerageFlatTax,
        Self::EquityExposure,
        Self::Liquidity,
        Self::CurrencyExposure,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Self::CustodianConcentration => "S01",
            Self::JurisdictionConcentration => "S02",
            Self::LifeInsuranceLockup => "S03",
            Self::DepositGuarantee => "S04",
            Self::PeaCeiling => "S05",
            Self::BrokerageFlatTax => "S06",
            Self::EquityExposure => "S07",
            Self::Liquidity => "S08",
            Self::CurrencyExposure => "S09",
        }
    }

    pub fn category(&self) -> RiskCategory {
        match self {
            Self::CustodianConcentration => RiskCategory::Concentration,
            Self::JurisdictionConcentration => RiskCategory::Jurisdiction,
            Self::LifeInsuranceLockup | Self::DepositGuarantee | Self::PeaCeiling => {
                RiskCategory::Regulatory
            }
            Self::BrokerageFlatTax => RiskCategory::Fiscal,
            Self::EquityExposure => RiskCategory::Market,
            Self::Liquidity => RiskCategory::Liquidity,
            Self::CurrencyExposure => RiskCategory::Currency,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::CustodianConcentration => "custodian concentration",
            Self::JurisdictionConcentration => "jurisdiction concentration",
            Self::LifeInsuranceLockup => "life insurance lock-up",
            Self::DepositGuarantee => "deposit guarantee overflow",
            Self::PeaCeiling => "PEA ceiling",
            Self::BrokerageFlatTax => "brokerage flat tax",
            Self::EquityExposure => "equity exposure",
            Self::Liquidity => "liquidity shortfall",
            Self::CurrencyExposure => "foreign currency exposure",
        }
    }
}

fn pct(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole * 100.0
    } else {
        0.0
    }
}

fn amount(value: f64, currency: &str) -> String {
    let digits = format!("{:.0}", value.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(c);
    }
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}{} {}", sign, grouped, currency)
}

/// Accumulates records and keeps ids unique within one run
struct Findings {
    records: Vec<RiskRecord>,
    used: HashSet<String>,
}

impl Findings {
    fn new() -> Self {
        Self {
            records: Vec::new(),
            used: HashSet::new(),
        }
    }

    fn id(&mut self, rule: StructuralRule, subject: Option<&str>) -> RiskId {
        let base = RiskId::structural(rule.code(), subject);
        let mut id = base.clone();
        let mut n = 2;
        while !self.used.insert(id.as_str().to_string()) {
            id = RiskId::structural(&format!("{}-{}", base, n), None);
            n += 1;
        }
        id
    }

    fn push(&mut self, record: RiskRecord) {
        debug!("{} fired: {} ({})", record.id, record.title, record.severity);
        self.records.push(record);
    }
}

/// Threshold-based structural analyzer
#[derive(Debug, Clone)]
pub struct StructuralAnalyzer {
    thresholds: ThresholdConfig,
}

impl StructuralAnalyzer {
    pub fn new(thresholds: ThresholdConfig) -> Result<Self, StructuralError> {
        thresholds.validate()?;
        Ok(Self { thresholds })
    }

    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    /// Evaluate every rule against the snapshot
    pub fn analyze(&self, snapshot: &PortfolioSnapshot) -> Result<Vec<RiskRecord>, StructuralError> {
        snapshot.validate()?;
        let mut findings = Findings::new();

        for rule in StructuralRule::ALL {
            match rule {
                StructuralRule::CustodianConcentration => self.custodian_concentration(snapshot, &mut findings),
                StructuralRule::JurisdictionConcentration => self.jurisdiction_concentration(snapshot, &mut findings),
                StructuralRule::LifeInsuranceLockup => self.life_insurance(snapshot, &mut findings),
                StructuralRule::DepositGuarantee => self.deposit_guarantee(snapshot, &mut findings),
                StructuralRule::PeaCeiling => self.pea_ceiling(snapshot, &mut findings),
                StructuralRule::BrokerageFlatTax => self.brokerage(snapshot, &mut findings),
                StructuralRule::EquityExposure => self.equity(snapshot, &mut findings),
                StructuralRule::Liquidity => self.liquidity(snapshot, &mut findings),
                StructuralRule::CurrencyExposure => self.currency(snapshot, &mut findings),
            }
        }

        debug!("Structural analysis produced {} records", findings.records.len());
        Ok(findings.records)
    }

    fn custodian_concentration(&self, snapshot: &PortfolioSnapshot, findings: &mut Findings) {
        let rule = StructuralRule::CustodianConcentration;
        let total = snapshot.financial_total();
        if total <= 0.0 {
            return;
        }
        for custodian in &snapshot.custodians {
            let share = pct(custodian.total, total);
            let Some(severity) = self.thresholds.custodian_share.classify(share) else {
                continue;
            };
            let impact = if severity == Severity::Critical {
                Impact::High
            } else {
                Impact::Medium
            };
            let id = findings.id(rule, Some(&custodian.name));
            findings.push(
                RiskRecord::builder(id, rule.category(), severity)
                    .title(format!("Custodian concentration: {}", custodian.name))
                    .description(format!(
                        "{} holds {:.1}% of financial assets ({}).",
                        custodian.name,
                        share,
                        amount(custodian.total, &snapshot.base_currency)
                    ))
                    .exposure(custodian.total, share)
                    .assessment(Likelihood::Low, impact)
                    .build(),
            );
        }
    }

    fn jurisdiction_concentration(&self, snapshot: &PortfolioSnapshot, findings: &mut Findings) {
        let rule = StructuralRule::JurisdictionConcentration;
        let total = snapshot.financial_total() + snapshot.crypto_total();
        if total <= 0.0 {
            return;
        }
        for (jurisdiction, held) in snapshot.jurisdiction_totals() {
            let share = pct(held, total);
            let Some(severity) = self.thresholds.jurisdiction_share.classify(share) else {
                continue;
            };
            let (probability, impact) = if severity == Severity::Critical {
                (Likelihood::Medium, Impact::High)
            } else {
                (Likelihood::Low, Impact::Medium)
            };
            let id = findings.id(rule, Some(&jurisdiction));
            findings.push(
                RiskRecord::builder(id, rule.category(), severity)
                    .title(format!("Jurisdiction concentration: {}", jurisdiction))
                    .description(format!(
                        "{:.1}% of financial and crypto assets sit under {} jurisdiction, \
                         concentrating country and political risk.",
                        share, jurisdiction
                    ))
                    .exposure(held, share)
                    .assessment(probability, impact)
                    .build(),
            );
        }
    }

    fn life_insurance(&self, snapshot: &PortfolioSnapshot, findings: &mut Findings) {
        let rule = StructuralRule::LifeInsuranceLockup;
        let total = snapshot.financial_total();
        let held = snapshot.life_insurance_total();
        if held <= 0.0 || total <= 0.0 {
            return;
        }
        let share = pct(held, total);
        let Some(severity) = self.thresholds.life_insurance_share.classify(share) else {
            return;
        };
        let id = findings.id(rule, None);
        findings.push(
            RiskRecord::builder(id, rule.category(), severity)
                .title("Life insurance withdrawal freeze")
                .description(format!(
                    "Regulators may temporarily freeze life insurance withdrawals during a \
                     banking crisis. Exposure: {} ({:.1}% of financial assets).",
                    amount(held, &snapshot.base_currency),
                    share
                ))
                .exposure(held, share)
                .assessment(Likelihood::Low, Impact::High)
                .build(),
        );
    }

    fn deposit_guarantee(&self, snapshot: &PortfolioSnapshot, findings: &mut Findings) {
        let rule = StructuralRule::DepositGuarantee;
        let ceiling = self.thresholds.deposit_guarantee_ceiling;
        for custodian in &snapshot.custodians {
            let deposits = snapshot.deposits_at(custodian);
            if deposits <= ceiling {
                continue;
            }
            let excess = deposits - ceiling;
            let id = findings.id(rule, Some(&custodian.name));
            findings.push(
                RiskRecord::builder(id, rule.category(), Severity::Medium)
                    .title(format!("Deposit guarantee exceeded: {}", custodian.name))
                    .description(format!(
                        "Deposits at {} exceed the {} guarantee ceiling by {}.",
                        custodian.name,
                        amount(ceiling, &snapshot.base_currency),
                        amount(excess, &snapshot.base_currency)
                    ))
                    .exposure(excess, pct(excess, deposits))
                    .assessment(Likelihood::VeryLow, Impact::High)
                    .build(),
            );
        }
    }

    fn pea_ceiling(&self, snapshot: &PortfolioSnapshot, findings: &mut Findings) {
        let rule = StructuralRule::PeaCeiling;
        let ceiling = self.thresholds.pea_ceiling;
        for custodian in &snapshot.custodians {
            for account in custodian.accounts.iter().filter(|a| a.kind == AccountKind::Pea) {
                if account.amount <= ceiling {
                    continue;
                }
                let id = findings.id(rule, Some(&custodian.name));
                findings.push(
                    RiskRecord::builder(id, rule.category(), Severity::Low)
                        .title(format!("PEA ceiling reached: {}", custodian.name))
                        .description(format!(
                            "The PEA at {} exceeds the {} contribution ceiling; new payments are no longer possible.",
                            custodian.name,
                            amount(ceiling, &snapshot.base_currency)
                        ))
                        .exposure(account.amount - ceiling, 0.0)
                        .assessment(Likelihood::NotApplicable, Impact::Low)
                        .build(),
                );
            }
        }
    }

    fn brokerage(&self, snapshot: &PortfolioSnapshot, findings: &mut Findings) {
        let rule = StructuralRule::BrokerageFlatTax;
        let held = snapshot.brokerage_total();
        if held <= 0.0 {
            return;
        }
        let Some(severity) = self.thresholds.brokerage_exposure.classify(held) else {
            return;
        };
        let id = findings.id(rule, None);
        findings.push(
            RiskRecord::builder(id, rule.category(), severity)
                .title("Flat tax increase on brokerage accounts")
                .description(format!(
                    "{} held in brokerage accounts is taxed at the flat rate and exposed to a future rate increase.",
                    amount(held, &snapshot.base_currency)
                ))
                .exposure(held, pct(held, snapshot.financial_total()))
                .assessment(Likelihood::Medium, Impact::Medium)
                .build(),
        );
    }

    fn equity(&self, snapshot: &PortfolioSnapshot, findings: &mut Findings) {
        let rule = StructuralRule::EquityExposure;
        let total = snapshot.financial_total();
        if total <= 0.0 {
            return;
        }
        let held = snapshot.equity_exposure();
        let share = pct(held, total);
        let Some(severity) = self.thresholds.equity_share.classify(share) else {
            return;
        };
        let id = findings.id(rule, None);
        findings.push(
            RiskRecord::builder(id, rule.category(), severity)
                .title("High equity exposure")
                .description(format!(
                    "Equities make up {:.1}% of financial assets; a market drawdown would hit the portfolio hard.",
                    share
                ))
                .exposure(held, share)
                .assessment(Likelihood::Medium, Impact::High)
                .build(),
        );
    }

    fn liquidity(&self, snapshot: &PortfolioSnapshot, findings: &mut Findings) {
        let rule = StructuralRule::Liquidity;
        if snapshot.custodians.is_empty() {
            return;
        }
        let cash = snapshot.liquid_cash();
        let Some(severity) = self.thresholds.liquidity.classify(cash) else {
            return;
        };
        let impact = if severity == Severity::Critical {
            Impact::High
        } else {
            Impact::Medium
        };
        let id = findings.id(rule, None);
        findings.push(
            RiskRecord::builder(id, rule.category(), severity)
                .title("Low liquidity")
                .description(format!(
                    "Only {} is available on deposit accounts.",
                    amount(cash, &snapshot.base_currency)
                ))
                .exposure(cash, pct(cash, snapshot.financial_total()))
                .assessment(Likelihood::NotApplicable, impact)
                .build(),
        );
    }

    fn currency(&self, snapshot: &PortfolioSnapshot, findings: &mut Findings) {
        let rule = StructuralRule::CurrencyExposure;
        let total = snapshot.grand_total();
        if total <= 0.0 {
            return;
        }
        let exposure = snapshot.foreign_currency_exposure();
        let held = exposure.total();
        let share = pct(held, total);
        let Some(severity) = self.thresholds.currency_share.classify(share) else {
            return;
        };
        let (probability, impact) = match severity {
            Severity::Critical | Severity::High => (Likelihood::Medium, Impact::High),
            Severity::Medium => (Likelihood::Medium, Impact::Medium),
            Severity::Low => (Likelihood::Low, Impact::Low),
        };
        let id = findings.id(rule, None);
        findings.push(
            RiskRecord::builder(id, rule.category(), severity)
                .title(format!("Foreign currency exposure outside {}", snapshot.base_currency))
                .description(format!(
                    "{:.1}% of all assets is exposed to foreign currencies: accounts {}, crypto {}, foreign real estate {}.",
                    share,
                    amount(exposure.accounts, &snapshot.base_currency),
                    amount(exposure.crypto, &snapshot.base_currency),
                    amount(exposure.real_estate, &snapshot.base_currency)
                ))
                .exposure(held, share)
                .assessment(probability, impact)
                .build(),
        );
    }
}
