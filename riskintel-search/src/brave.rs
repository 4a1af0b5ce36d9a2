//! Brave Search API backend

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use riskintel_core::{Relevance, SearchResult};

use crate::{
    build_client, check_status, parse_json, require_api_key, retain_valid, transport_error,
    ProviderConfig, ProviderError, SearchParams, SearchProvider,
};

pub const BRAVE_ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";

/// Brave web search, authenticated by `X-Subscription-Token`
pub struct BraveProvider {
    client: Client,
    endpoint: String,
}

impl BraveProvider {
    pub const ID: &'static str = "brave";

    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(config.timeout())?,
            endpoint: config.endpoint.clone().unwrap_or_else(|| BRAVE_ENDPOINT.to_string()),
        })
    }
}

#[async_trait]
impl SearchProvider for BraveProvider {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn execute(
        &self,
        query: &str,
        params: &SearchParams,
        config: &ProviderConfig,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        let api_key = require_api_key(Self::ID, config)?;
        let limit = params.limit(config);
        let count = limit.to_string();

        let response = self
            .client
            .get(&self.endpoint)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", api_key)
            .query(&[
                ("q", query),
                ("count", count.as_str()),
                ("search_lang", params.lang.as_str()),
                ("country", params.country.as_str()),
            ])
            .send()
            .await
            .map_err(|e| transport_error(Self::ID, &e, Some(api_key)))?;

        check_status(Self::ID, response.status())?;
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(Self::ID, &e, Some(api_key)))?;
        let parsed: BraveSearchResponse = parse_json(Self::ID, &body)?;

        let results = parsed
            .web
            .map(|web| web.results)
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, r)| {
                SearchResult::new(&r.url, &r.title, &r.description, Relevance::from_position(i), Self::ID)
            })
            .collect();

        let results = retain_valid(results, limit);
        debug!("Brave returned {} results for '{}'", results.len(), query);
        Ok(results)
    }
}

// Brave Search API response types
#[derive(Debug, Deserialize)]
struct BraveSearchResponse {
    #[serde(default)]
    web: Option<BraveWebResults>,
}

#[derive(Debug, Deserialize)]
struct BraveWebResults {
    #[serde(default)]
    results: Vec<BraveWebResult>,
}

#[derive(Debug, Deserialize)]
struct BraveWebResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    description: String,
}
