//! Risk records and the severity-bucketed registry
//!
//! Records are immutable once built. The registry is the only place where
//! records from both analysis paths meet, and it enforces the partition
//! invariant: every record sits in exactly the bucket of its own severity
//! and no id appears twice.

use serde::{Deserialize, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

use crate::SearchResult;

/// Severity tier of a risk finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub const ALL: [Severity; 4] = [Self::Critical, Self::High, Self::Medium, Self::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Probability that a risk materializes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Likelihood {
    VeryLow,
    Low,
    Medium,
    High,
    NotApplicable,
}

/// Impact if a risk materializes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    Low,
    Medium,
    High,
}

/// Risk family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    /// Custodian concentration
    Concentration,
    /// Jurisdictional concentration
    Jurisdiction,
    Regulatory,
    Fiscal,
    Market,
    Liquidity,
    Currency,
}

impl RiskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Concentration => "concentration",
            Self::Jurisdiction => "jurisdiction",
            Self::Regulatory => "regulatory",
            Self::Fiscal => "fiscal",
            Self::Market => "market",
            Self::Liquidity => "liquidity",
            Self::Currency => "currency",
        }
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which analysis path produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskOrigin {
    Structural,
    Contextual,
}

/// Namespaced risk identifier
///
/// Structural ids come from the fixed rule catalog (`S01`, `S04/bank-x`),
/// contextual ids from a run-local counter (`C1000`, `C1001`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiskId(String);

impl RiskId {
    pub fn structural(code: &str, subject: Option<&str>) -> Self {
        match subject {
            Some(subject) => Self(format!("{}/{}", code, slugify(subject))),
            None => Self(code.to_string()),
        }
    }

    pub fn contextual(counter: u32) -> Self {
        Self(format!("C{}", counter))
    }

    pub fn is_contextual(&self) -> bool {
        self.0.starts_with('C')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RiskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lowercase ASCII slug of a free-text name
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// A single risk finding
///
/// Serialized with `category` carrying the origin suffix, so contextual
/// records read `market/contextual` downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskRecord {
    pub id: RiskId,
    pub title: String,
    pub description: String,
    pub exposure_amount: f64,
    pub exposure_pct: f64,
    pub probability: Likelihood,
    pub impact: Impact,
    pub severity: Severity,
    pub category: RiskCategory,
    pub origin: RiskOrigin,
    pub sources: Vec<SearchResult>,
}

impl RiskRecord {
    pub fn builder(id: RiskId, category: RiskCategory, severity: Severity) -> RiskRecordBuilder {
        RiskRecordBuilder::new(id, category, severity)
    }

    /// Category with the contextual-origin suffix, e.g. `market/contextual`
    pub fn category_label(&self) -> String {
        match self.origin {
            RiskOrigin::Structural => self.category.to_string(),
            RiskOrigin::Contextual => format!("{}/contextual", self.category),
        }
    }
}

#[derive(Serialize)]
struct RecordWire<'a> {
    id: &'a RiskId,
    title: &'a str,
    description: &'a str,
    exposure_amount: f64,
    exposure_pct: f64,
    probability: Likelihood,
    impact: Impact,
    severity: Severity,
    category: String,
    origin: RiskOrigin,
    sources: &'a [SearchResult],
}

impl Serialize for RiskRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RecordWire {
            id: &self.id,
            title: &self.title,
            description: &self.description,
            exposure_amount: self.exposure_amount,
            exposure_pct: self.exposure_pct,
            probability: self.probability,
            impact: self.impact,
            severity: self.severity,
            category: self.category_label(),
            origin: self.origin,
            sources: &self.sources,
        }
        .serialize(serializer)
    }
}

/// Builder for risk records
pub struct RiskRecordBuilder {
    record: RiskRecord,
}

impl RiskRecordBuilder {
    pub fn new(id: RiskId, category: RiskCategory, severity: Severity) -> Self {
        let origin = if id.is_contextual() {
            RiskOrigin::Contextual
        } else {
            RiskOrigin::Structural
        };
        Self {
            record: RiskRecord {
                id,
                title: String::new(),
                description: String::new(),
                exposure_amount: 0.0,
                exposure_pct: 0.0,
                probability: Likelihood::NotApplicable,
                impact: Impact::Medium,
                severity,
                category,
                origin,
                sources: Vec::new(),
            },
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.record.title = title.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.record.description = description.into();
        self
    }

    /// Exposure amount and percentage; the percentage is rounded to one decimal
    pub fn exposure(mut self, amount: f64, pct: f64) -> Self {
        self.record.exposure_amount = amount;
        self.record.exposure_pct = (pct * 10.0).round() / 10.0;
        self
    }

    pub fn assessment(mut self, probability: Likelihood, impact: Impact) -> Self {
        self.record.probability = probability;
        self.record.impact = impact;
        self
    }

    pub fn sources(mut self, sources: Vec<SearchResult>) -> Self {
        self.record.sources = sources;
        self
    }

    pub fn build(self) -> RiskRecord {
        self.record
    }
}

/// Errors from registry construction
#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("duplicate risk id: {0}")]
    DuplicateId(RiskId),
}

/// Risk records bucketed by severity
#[derive(Debug, Clone, Default, Serialize)]
pub struct RiskRegistry {
    critical: Vec<RiskRecord>,
    high: Vec<RiskRecord>,
    medium: Vec<RiskRecord>,
    low: Vec<RiskRecord>,
    #[serde(skip)]
    ids: HashSet<RiskId>,
}

impl RiskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Concatenate structural then contextual records and bucket them
    ///
    /// Within a bucket, structural records come before contextual ones and
    /// each path keeps its own emission order.
    pub fn merge(
        structural: Vec<RiskRecord>,
        contextual: Vec<RiskRecord>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for record in structural.into_iter().chain(contextual) {
            registry.insert(record)?;
        }
        Ok(registry)
    }

    pub fn insert(&mut self, record: RiskRecord) -> Result<(), RegistryError> {
        if !self.ids.insert(record.id.clone()) {
            return Err(RegistryError::DuplicateId(record.id));
        }
        self.bucket_mut(record.severity).push(record);
        Ok(())
    }

    fn bucket_mut(&mut self, severity: Severity) -> &mut Vec<RiskRecord> {
        match severity {
            Severity::Critical => &mut self.critical,
            Severity::High => &mut self.high,
            Severity::Medium => &mut self.medium,
            Severity::Low => &mut self.low,
        }
    }

    pub fn bucket(&self, severity: Severity) -> &[RiskRecord] {
        match severity {
            Severity::Critical => &self.critical,
            Severity::High => &self.high,
            Severity::Medium => &self.medium,
            Severity::Low => &self.low,
        }
    }

    /// All records, most severe bucket first
    pub fn iter(&self) -> impl Iterator<Item = &RiskRecord> {
        Severity::ALL.into_iter().flat_map(move |s| self.bucket(s).iter())
    }

    pub fn get(&self, id: &RiskId) -> Option<&RiskRecord> {
        self.iter().find(|r| &r.id == id)
    }

    pub fn contains(&self, id: &RiskId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Record count per bucket, in `Severity::ALL` order
    pub fn counts(&self) -> [usize; 4] {
        Severity::ALL.map(|s| self.bucket(s).len())
    }

    /// SHA-256 over the bucketed contents, for comparing runs
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for severity in Severity::ALL {
            for record in self.bucket(severity) {
                hasher.update(
                    format!(
                        "{}|{}|{}|{:.2}|{:.1}",
                        severity,
                        record.id,
                        record.category_label(),
                        record.exposure_amount,
                        record.exposure_pct
                    )
                    .as_bytes(),
                );
                for source in &record.sources {
                    hasher.update(source.url.as_bytes());
                }
                hasher.update(b"\n");
            }
        }
        format!("{:x}", hasher.finalize())
    }
}
