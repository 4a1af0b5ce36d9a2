//! Normalized web search contract
//!
//! Every provider maps its upstream format onto [`SearchResult`], so the
//! rest of the engine never sees provider-specific shapes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::MAX_SNIPPET_CHARS;

/// Logical grouping of queries used to route to a specialized provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchCategory {
    /// Verifiable facts (rules, ceilings, legal texts)
    Factual,
    /// Figures and market data
    Quantitative,
    /// News and economic context
    Contextual,
    /// Local property market
    RealEstate,
}

impl SearchCategory {
    pub const ALL: [SearchCategory; 4] = [
        Self::Factual,
        Self::Quantitative,
        Self::Contextual,
        Self::RealEstate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Factual => "factual",
            Self::Quantitative => "quantitative",
            Self::Contextual => "contextual",
            Self::RealEstate => "real_estate",
        }
    }
}

impl fmt::Display for SearchCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A categorized search made of one or more query texts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub category: SearchCategory,
    pub queries: Vec<String>,
    #[serde(default)]
    pub context: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_lang")]
    pub lang: String,
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_max_results() -> usize {
    10
}

fn default_lang() -> String {
    "fr".to_string()
}

fn default_country() -> String {
    "FR".to_string()
}

impl SearchQuery {
    pub fn new(category: SearchCategory, queries: Vec<String>) -> Self {
        Self {
            category,
            queries,
            context: String::new(),
            max_results: default_max_results(),
            lang: default_lang(),
            country: default_country(),
        }
    }

    pub fn with_context(mut self, context: &str) -> Self {
        self.context = context.to_string();
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_locale(mut self, lang: &str, country: &str) -> Self {
        self.lang = lang.to_string();
        self.country = country.to_string();
        self
    }
}

/// Relevance tier of a search result
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relevance {
    High,
    Medium,
    Low,
}

impl Relevance {
    /// Tier from the 0-indexed rank in a provider's result list
    pub fn from_position(position: usize) -> Self {
        match position {
            0..=1 => Self::High,
            2..=3 => Self::Medium,
            _ => Self::Low,
        }
    }

    /// Tier from a provider-supplied score in [0, 1]
    pub fn from_score(score: f64) -> Self {
        if score >= 0.7 {
            Self::High
        } else if score >= 0.4 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Numeric weight used by relevance scorers
    pub fn weight(&self) -> f64 {
        match self {
            Self::High => 1.0,
            Self::Medium => 0.6,
            Self::Low => 0.3,
        }
    }
}

/// A normalized search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub relevance: Relevance,
    pub accessed: NaiveDate,
    /// Id of the provider that returned this result
    pub provider: String,
}

impl SearchResult {
    /// Build a result, truncating the snippet and stamping today's date
    pub fn new(url: &str, title: &str, snippet: &str, relevance: Relevance, provider: &str) -> Self {
        Self {
            url: url.trim().to_string(),
            title: title.trim().to_string(),
            snippet: truncate_chars(snippet.trim(), MAX_SNIPPET_CHARS),
            relevance,
            accessed: chrono::Local::now().date_naive(),
            provider: provider.to_string(),
        }
    }

    /// A result is usable only with both a URL and a title
    pub fn is_valid(&self) -> bool {
        !self.url.is_empty() && !self.title.is_empty()
    }
}

/// Truncate to at most `max` characters without splitting a code point
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
