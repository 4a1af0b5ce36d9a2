//! Provider contract and failure taxonomy

use async_trait::async_trait;
use thiserror::Error;

use riskintel_core::{SearchQuery, SearchResult};

use crate::ProviderConfig;

/// Placeholder substituted for credentials in error messages
pub const REDACTED: &str = "[REDACTED]";

/// Errors returned by a single provider call
///
/// The fallback chain treats every variant as "advance to the next
/// provider"; only [`ProviderError::is_retryable`] variants are retried
/// on the same provider first. A rate-limit signal advances the chain
/// immediately.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Missing credential, disabled provider, or rejected key
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// Network error, timeout, or 5xx
    #[error("transient failure: {0}")]
    Transient(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Response body could not be parsed
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Invalid request built from our own configuration (4xx other than 401/403/429)
    #[error("misconfigured request: {0}")]
    Misconfigured(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "unavailable",
            Self::Transient(_) => "transient",
            Self::RateLimited(_) => "rate_limited",
            Self::MalformedResponse(_) => "malformed_response",
            Self::Misconfigured(_) => "misconfigured",
        }
    }

    /// Same error with every occurrence of `secret` masked
    pub fn redacted(self, secret: Option<&str>) -> Self {
        let Some(secret) = secret.filter(|s| !s.is_empty()) else {
            return self;
        };
        let mask = |msg: String| msg.replace(secret, REDACTED);
        match self {
            Self::Unavailable(m) => Self::Unavailable(mask(m)),
            Self::Transient(m) => Self::Transient(mask(m)),
            Self::RateLimited(m) => Self::RateLimited(mask(m)),
            Self::MalformedResponse(m) => Self::MalformedResponse(mask(m)),
            Self::Misconfigured(m) => Self::Misconfigured(mask(m)),
        }
    }
}

/// Request parameters shared by every provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    pub max_results: usize,
    pub lang: String,
    pub country: String,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            max_results: 10,
            lang: "fr".to_string(),
            country: "FR".to_string(),
        }
    }
}

impl From<&SearchQuery> for SearchParams {
    fn from(query: &SearchQuery) -> Self {
        Self {
            max_results: query.max_results,
            lang: query.lang.clone(),
            country: query.country.clone(),
        }
    }
}

impl SearchParams {
    /// Effective result count: the smaller of the request and the provider cap
    pub fn limit(&self, config: &ProviderConfig) -> usize {
        self.max_results.min(config.max_results).max(1)
    }
}

/// A web search backend
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Stable identifier used in configuration, routing and logs
    fn id(&self) -> &str;

    fn requires_credentials(&self) -> bool {
        true
    }

    /// Cheap readiness check; never performs I/O
    fn is_available(&self, config: &ProviderConfig) -> bool {
        config.enabled && (!self.requires_credentials() || config.has_credentials())
    }

    /// Execute one query text and return normalized, valid results
    async fn execute(
        &self,
        query: &str,
        params: &SearchParams,
        config: &ProviderConfig,
    ) -> Result<Vec<SearchResult>, ProviderError>;
}

/// Fetch the credential or fail with `Unavailable`
pub fn require_api_key<'a>(provider: &str, config: &'a ProviderConfig) -> Result<&'a str, ProviderError> {
    if !config.enabled {
        return Err(ProviderError::Unavailable(format!("{} is disabled", provider)));
    }
    config
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| {
            ProviderError::Unavailable(format!(
                "{} has no API key ({}_API_KEY)",
                provider,
                provider.to_uppercase()
            ))
        })
}

/// Keep only results carrying both a URL and a title, capped at `limit`
pub fn retain_valid(results: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
    results.into_iter().filter(SearchResult::is_valid).take(limit).collect()
}
