//! Contextual search definitions
//!
//! Loads `[[definition]]` tables from TOML, either the embedded defaults
//! or a user-supplied file, and renders query templates against a snapshot.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

use riskintel_core::{
    Impact, Likelihood, PortfolioSnapshot, Property, RiskCategory, SearchCategory, Severity,
};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{([a-z_]+)\}").unwrap());

/// Town following a five-digit postcode, as in `12 rue X, 75008 Paris`
static POSTCODE_CITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{5}\s+([^\d,]+)").unwrap());

const KNOWN_PLACEHOLDERS: &[&str] = &[
    "year",
    "top_custodian",
    "top_jurisdiction",
    "city",
    "property_kind",
];

/// Only filled in for property-scoped definitions
const PROPERTY_PLACEHOLDERS: &[&str] = &["city", "property_kind"];

const EMBEDDED: &str = include_str!("../definitions/contextual.toml");

/// Errors loading contextual definitions
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("failed to read definitions: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse definitions: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("duplicate definition id: {0}")]
    DuplicateId(String),

    #[error("definition {id} uses unknown placeholder {{{name}}}")]
    UnknownPlaceholder { id: String, name: String },

    #[error("definition {id} is invalid: {reason}")]
    Invalid { id: String, reason: String },
}

/// Which snapshot amount a contextual risk is quantified against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposureBasis {
    #[default]
    Financial,
    GrandTotal,
    Equity,
    Crypto,
    RealEstate,
    None,
}

impl ExposureBasis {
    pub fn amount(&self, snapshot: &PortfolioSnapshot) -> f64 {
        match self {
            Self::Financial => snapshot.financial_total(),
            Self::GrandTotal => snapshot.grand_total(),
            Self::Equity => snapshot.equity_exposure(),
            Self::Crypto => snapshot.crypto_total(),
            Self::RealEstate => snapshot.real_estate_total(),
            Self::None => 0.0,
        }
    }
}

/// What a definition is evaluated against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionScope {
    /// Once per snapshot
    #[default]
    Portfolio,
    /// Once per real estate holding with a known city, quantified
    /// against that holding's value
    Property,
}

/// Shape of the record a definition emits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskTemplate {
    pub title: String,
    pub description: String,
    pub probability: Likelihood,
    pub impact: Impact,
    pub severity: Severity,
    pub category: RiskCategory,
    #[serde(default)]
    pub exposure: ExposureBasis,
    /// Fixed percentage; computed against the grand total when absent
    #[serde(default)]
    pub exposure_pct: Option<f64>,
    /// Skip the search entirely when the exposure amount is zero
    #[serde(default)]
    pub skip_when_unexposed: bool,
}

fn default_true() -> bool {
    true
}

fn default_relevance_threshold() -> f64 {
    0.4
}

fn default_min_result_relevance() -> f64 {
    0.3
}

fn default_max_sources() -> usize {
    3
}

/// One contextual search definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextualDefinition {
    pub id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub category: SearchCategory,
    #[serde(default)]
    pub scope: DefinitionScope,
    pub queries: Vec<String>,
    #[serde(default)]
    pub context: String,
    /// Minimum mean score of the qualifying results
    #[serde(default = "default_relevance_threshold")]
    pub relevance_threshold: f64,
    /// Minimum score for a result to count as corroboration
    #[serde(default = "default_min_result_relevance")]
    pub min_result_relevance: f64,
    /// Overrides the agent-wide minimum source count
    #[serde(default)]
    pub min_sources: Option<usize>,
    #[serde(default = "default_max_sources")]
    pub max_sources: usize,
    pub risk: RiskTemplate,
}

/// City of a holding: the explicit field, else the town after a postcode
pub fn property_city(property: &Property) -> Option<String> {
    let city = property.city.trim();
    if !city.is_empty() {
        return Some(city.to_string());
    }
    POSTCODE_CITY
        .captures(&property.address)
        .map(|caps| caps[1].trim().to_string())
        .filter(|city| !city.is_empty())
}

/// Values substituted into query templates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateVars {
    pub year: i32,
    pub top_custodian: Option<String>,
    pub top_jurisdiction: Option<String>,
    pub city: Option<String>,
    pub property_kind: Option<String>,
}

impl TemplateVars {
    pub fn from_snapshot(snapshot: &PortfolioSnapshot, year: i32) -> Self {
        Self {
            year,
            top_custodian: snapshot.top_custodian().map(|c| c.name.clone()),
            top_jurisdiction: snapshot.top_jurisdiction().map(|(j, _)| j),
            city: None,
            property_kind: None,
        }
    }

    /// Snapshot values plus the holding's city and kind
    ///
    /// `None` when no city can be determined for the holding.
    pub fn for_property(&self, property: &Property) -> Option<Self> {
        let city = property_city(property)?;
        Some(Self {
            city: Some(city),
            property_kind: Some(property.kind.trim().to_lowercase()).filter(|k| !k.is_empty()),
            ..self.clone()
        })
    }

    fn lookup(&self, name: &str) -> Option<String> {
        match name {
            "year" => Some(self.year.to_string()),
            "top_custodian" => self.top_custodian.clone(),
            "top_jurisdiction" => self.top_jurisdiction.clone(),
            "city" => self.city.clone(),
            "property_kind" => self.property_kind.clone(),
            _ => None,
        }
    }

    /// Fill every placeholder of `template`; `None` if any has no value
    pub fn render(&self, template: &str) -> Option<String> {
        let mut missing = false;
        let rendered = PLACEHOLDER.replace_all(template, |caps: &regex::Captures<'_>| {
            self.lookup(&caps[1]).unwrap_or_else(|| {
                missing = true;
                String::new()
            })
        });
        let rendered = rendered.trim().to_string();
        (!missing && !rendered.is_empty()).then_some(rendered)
    }
}

impl ContextualDefinition {
    pub fn min_sources(&self, default: usize) -> usize {
        self.min_sources.unwrap_or(default).max(1)
    }

    /// Query texts with placeholders filled in
    ///
    /// A template whose placeholder has no value for this snapshot is dropped.
    pub fn render_queries(&self, vars: &TemplateVars) -> Vec<String> {
        self.queries
            .iter()
            .filter_map(|template| vars.render(template))
            .collect()
    }

    fn validate(&self) -> Result<(), DefinitionError> {
        let invalid = |reason: &str| DefinitionError::Invalid {
            id: self.id.clone(),
            reason: reason.to_string(),
        };
        if self.id.trim().is_empty() {
            return Err(invalid("empty id"));
        }
        if self.queries.iter().all(|q| q.trim().is_empty()) {
            return Err(invalid("no queries"));
        }
        for (name, value) in [
            ("relevance_threshold", self.relevance_threshold),
            ("min_result_relevance", self.min_result_relevance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(&format!("{} must be within [0, 1], got {}", name, value)));
            }
        }
        if self.max_sources == 0 {
            return Err(invalid("max_sources must be at least 1"));
        }
        if let Some(min) = self.min_sources {
            if min > self.max_sources {
                return Err(invalid(&format!(
                    "min_sources ({}) exceeds max_sources ({})",
                    min, self.max_sources
                )));
            }
        }
        let templates = self
            .queries
            .iter()
            .chain([&self.risk.title, &self.risk.description]);
        for template in templates {
            for caps in PLACEHOLDER.captures_iter(template) {
                let name = &caps[1];
                if !KNOWN_PLACEHOLDERS.contains(&name) {
                    return Err(DefinitionError::UnknownPlaceholder {
                        id: self.id.clone(),
                        name: name.to_string(),
                    });
                }
                if self.scope == DefinitionScope::Portfolio && PROPERTY_PLACEHOLDERS.contains(&name) {
                    return Err(invalid(&format!(
                        "{{{}}} is only available with scope = \"property\"",
                        name
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct DefinitionFile {
    #[serde(default)]
    definition: Vec<ContextualDefinition>,
}

/// Ordered set of contextual definitions
#[derive(Debug, Clone, Default)]
pub struct DefinitionSet {
    definitions: Vec<ContextualDefinition>,
}

impl DefinitionSet {
    pub fn new(definitions: Vec<ContextualDefinition>) -> Result<Self, DefinitionError> {
        let mut seen = HashSet::new();
        for definition in &definitions {
            definition.validate()?;
            if !seen.insert(definition.id.clone()) {
                return Err(DefinitionError::DuplicateId(definition.id.clone()));
            }
        }
        Ok(Self { definitions })
    }

    /// Load the definitions shipped with the crate
    pub fn load_embedded() -> Result<Self, DefinitionError> {
        Self::from_toml_str(EMBEDDED)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, DefinitionError> {
        let file: DefinitionFile = toml::from_str(content)?;
        Self::new(file.definition)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, DefinitionError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn get(&self, id: &str) -> Option<&ContextualDefinition> {
        self.definitions.iter().find(|d| d.id == id)
    }

    pub fn all(&self) -> &[ContextualDefinition] {
        &self.definitions
    }

    /// Enabled definitions in configuration order
    pub fn enabled(&self) -> impl Iterator<Item = &ContextualDefinition> {
        self.definitions.iter().filter(|d| d.enabled)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
