//! Category-aware fallback chain
//!
//! Resolves an ordered provider list per category, tries providers in
//! order until one succeeds, and never surfaces an error: total failure
//! is reported as an `Exhausted` outcome carrying an aggregated warning.

use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use riskintel_core::{SearchCategory, SearchLogEntry, SearchQuery, SearchResult};

use crate::{
    FactoryError, GatewayConfig, ProviderConfig, ProviderError, ProviderFactory, RateLimiter,
    RetryPolicy, SearchParams, SearchProvider,
};

/// How a chain call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStatus {
    /// At least one result
    Answered,
    /// A provider succeeded with no results
    Empty,
    /// Every provider failed for every query text
    Exhausted,
}

/// A provider failure recorded while walking the chain
#[derive(Debug, Clone)]
pub struct ProviderFailure {
    pub provider: String,
    pub query: String,
    pub error: ProviderError,
}

/// Result of one categorized search
#[derive(Debug, Clone)]
pub struct ChainOutcome {
    pub category: SearchCategory,
    /// Deduplicated by URL, first occurrence wins
    pub results: Vec<SearchResult>,
    pub status: ChainStatus,
    pub failures: Vec<ProviderFailure>,
    /// Provider that answered each successful query text
    pub providers_used: Vec<String>,
    /// One entry per query text executed by this call
    pub history: Vec<SearchLogEntry>,
}

impl ChainOutcome {
    pub fn is_exhausted(&self) -> bool {
        self.status == ChainStatus::Exhausted
    }

    /// Aggregated warning when the chain was exhausted
    pub fn warning(&self) -> Option<String> {
        if !self.is_exhausted() {
            return None;
        }
        if self.failures.is_empty() {
            return Some(format!("no search provider available for {}", self.category));
        }
        let details: Vec<String> = self
            .failures
            .iter()
            .map(|f| format!("{} ({})", f.provider, f.error))
            .collect();
        Some(format!(
            "all search providers failed for {}: {}",
            self.category,
            details.join("; ")
        ))
    }
}

struct ProviderSlot {
    provider: Arc<dyn SearchProvider>,
    config: ProviderConfig,
    limiter: RateLimiter,
    retry: RetryPolicy,
}

impl ProviderSlot {
    fn new(provider: Arc<dyn SearchProvider>, config: ProviderConfig) -> Self {
        Self {
            limiter: RateLimiter::new(config.rate_limit()),
            retry: RetryPolicy::from_config(&config),
            provider,
            config,
        }
    }

    fn id(&self) -> &str {
        self.provider.id()
    }

    async fn call(&self, text: &str, params: &SearchParams) -> Result<Vec<SearchResult>, ProviderError> {
        let provider = &self.provider;
        let config = &self.config;
        self.retry
            .run(provider.id(), &self.limiter, config.timeout(), || {
                provider.execute(text, params, config)
            })
            .await
            .map_err(|e| e.redacted(config.api_key.as_deref()))
    }
}

/// Snapshot of a provider's place in the chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderStatus {
    pub id: String,
    pub available: bool,
    pub requires_credentials: bool,
    pub affinity: Vec<SearchCategory>,
}

/// Ordered providers plus routing; shared read-only across tasks
pub struct FallbackChain {
    slots: Vec<ProviderSlot>,
    category_map: BTreeMap<SearchCategory, String>,
    enable_fallback: bool,
    fallback_on_empty: bool,
}

impl FallbackChain {
    pub fn builder() -> FallbackChainBuilder {
        FallbackChainBuilder::default()
    }

    /// Assemble the chain described by `config` from `factory`
    pub fn from_config(config: &GatewayConfig, factory: &ProviderFactory) -> Result<Self, FactoryError> {
        let mut builder = Self::builder()
            .enable_fallback(config.enable_fallback)
            .fallback_on_empty(config.fallback_on_empty);

        for name in &config.priority {
            let provider_config = config.provider(name);
            let provider = factory.create(name, &provider_config)?;
            for warning in provider_config.warnings(name, provider.requires_credentials()) {
                warn!("{}", warning);
            }
            builder = builder.provider(provider, provider_config);
        }

        for (category, name) in &config.category_map {
            if !config.priority.contains(name) {
                return Err(FactoryError::UnknownProvider(name.clone()));
            }
            builder = builder.route(*category, name);
        }

        let chain = builder.build();
        info!(
            "Search chain ready: [{}], {} available",
            chain.provider_ids().join(", "),
            chain.slots.iter().filter(|s| s.provider.is_available(&s.config)).count()
        );
        Ok(chain)
    }

    pub fn provider_ids(&self) -> Vec<&str> {
        self.slots.iter().map(ProviderSlot::id).collect()
    }

    pub fn statuses(&self) -> Vec<ProviderStatus> {
        self.slots
            .iter()
            .map(|s| ProviderStatus {
                id: s.id().to_string(),
                available: s.provider.is_available(&s.config),
                requires_credentials: s.provider.requires_credentials(),
                affinity: s.config.affinity.clone(),
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Preferred provider for a category: explicit map, then affinity
    fn preferred(&self, category: SearchCategory) -> Option<usize> {
        if let Some(name) = self.category_map.get(&category) {
            if let Some(idx) = self.slots.iter().position(|s| s.id() == name) {
                return Some(idx);
            }
        }
        self.slots
            .iter()
            .position(|s| s.config.affinity.contains(&category))
    }

    /// Provider order tried for a category
    fn resolve(&self, category: SearchCategory) -> Vec<usize> {
        let preferred = self.preferred(category);
        let mut order: Vec<usize> = preferred.into_iter().collect();
        order.extend((0..self.slots.len()).filter(|i| Some(*i) != preferred));
        if !self.enable_fallback {
            order.truncate(1);
        }
        order
    }

    /// Provider ids in resolution order for a category
    pub fn resolved_order(&self, category: SearchCategory) -> Vec<&str> {
        self.resolve(category)
            .into_iter()
            .map(|i| self.slots[i].id())
            .collect()
    }

    /// Run every query text of `query` with category routing
    pub async fn execute_category(&self, category: SearchCategory, query: &SearchQuery) -> ChainOutcome {
        let params = SearchParams::from(query);
        let order = self.resolve(category);

        let mut results = Vec::new();
        let mut seen = HashSet::new();
        let mut failures = Vec::new();
        let mut providers_used = Vec::new();
        let mut history = Vec::new();
        let mut any_success = false;

        for text in &query.queries {
            let (answer, mut text_failures) = self.execute_text(category, text, &params, &order).await;
            failures.append(&mut text_failures);

            let Some((provider, hits)) = answer else {
                history.push(log_entry(category, text, None, 0));
                continue;
            };
            any_success = true;
            history.push(log_entry(category, text, Some(&provider), hits.len()));
            providers_used.push(provider);

            for hit in hits {
                if seen.insert(hit.url.clone()) {
                    results.push(hit);
                }
            }
        }

        let status = if !results.is_empty() {
            ChainStatus::Answered
        } else if any_success || query.queries.is_empty() {
            ChainStatus::Empty
        } else {
            ChainStatus::Exhausted
        };

        let outcome = ChainOutcome {
            category,
            results,
            status,
            failures,
            providers_used,
            history,
        };
        if let Some(warning) = outcome.warning() {
            warn!("{}", warning);
        }
        outcome
    }

    /// Route by the query's own category
    pub async fn search(&self, query: &SearchQuery) -> ChainOutcome {
        self.execute_category(query.category, query).await
    }

    /// Walk the resolved order for one query text
    async fn execute_text(
        &self,
        category: SearchCategory,
        text: &str,
        params: &SearchParams,
        order: &[usize],
    ) -> (Option<(String, Vec<SearchResult>)>, Vec<ProviderFailure>) {
        let mut failures = Vec::new();
        let mut empty_success: Option<String> = None;

        for &idx in order {
            let slot = &self.slots[idx];
            let id = slot.id();

            if !slot.provider.is_available(&slot.config) {
                debug!("Skipping {} for {}: unavailable", id, category);
                failures.push(ProviderFailure {
                    provider: id.to_string(),
                    query: text.to_string(),
                    error: ProviderError::Unavailable(format!("{} not configured", id)),
                });
                continue;
            }

            match slot.call(text, params).await {
                Ok(hits) if hits.is_empty() && self.fallback_on_empty => {
                    debug!("{} returned nothing for '{}', trying next provider", id, text);
                    empty_success.get_or_insert_with(|| id.to_string());
                }
                Ok(hits) => {
                    debug!("{} answered '{}' with {} results", id, text, hits.len());
                    return (Some((id.to_string(), hits)), failures);
                }
                Err(e) => {
                    match &e {
                        ProviderError::Misconfigured(_) => {
                            error!("{} rejected request for '{}': {}", id, text, e)
                        }
                        _ => warn!("{} failed for '{}': {}, falling back", id, text, e),
                    }
                    failures.push(ProviderFailure {
                        provider: id.to_string(),
                        query: text.to_string(),
                        error: e,
                    });
                }
            }
        }

        (empty_success.map(|id| (id, Vec::new())), failures)
    }
}

fn log_entry(category: SearchCategory, query: &str, provider: Option<&str>, results: usize) -> SearchLogEntry {
    SearchLogEntry {
        category,
        query: query.to_string(),
        provider_used: provider.map(str::to_string),
        results,
        at: Utc::now(),
    }
}

/// Builder for [`FallbackChain`]
pub struct FallbackChainBuilder {
    slots: Vec<ProviderSlot>,
    category_map: BTreeMap<SearchCategory, String>,
    enable_fallback: bool,
    fallback_on_empty: bool,
}

impl Default for FallbackChainBuilder {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            category_map: BTreeMap::new(),
            enable_fallback: true,
            fallback_on_empty: true,
        }
    }
}

impl FallbackChainBuilder {
    /// Append a provider; order of calls is the global priority order
    /// unless `ProviderConfig::priority` says otherwise
    pub fn provider(mut self, provider: Arc<dyn SearchProvider>, config: ProviderConfig) -> Self {
        self.slots.push(ProviderSlot::new(provider, config));
        self
    }

    pub fn route(mut self, category: SearchCategory, provider: &str) -> Self {
        self.category_map.insert(category, provider.to_string());
        self
    }

    pub fn enable_fallback(mut self, enabled: bool) -> Self {
        self.enable_fallback = enabled;
        self
    }

    pub fn fallback_on_empty(mut self, enabled: bool) -> Self {
        self.fallback_on_empty = enabled;
        self
    }

    pub fn build(mut self) -> FallbackChain {
        self.slots.sort_by_key(|s| s.config.priority);
        FallbackChain {
            slots: self.slots,
            category_map: self.category_map,
            enable_fallback: self.enable_fallback,
            fallback_on_empty: self.fallback_on_empty,
        }
    }
}
