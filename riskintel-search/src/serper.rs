//! Serper (Google results) backend

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use riskintel_core::{Relevance, SearchResult};

use crate::{
    build_client, check_status, parse_json, require_api_key, retain_valid, transport_error,
    ProviderConfig, ProviderError, SearchParams, SearchProvider,
};

pub const SERPER_ENDPOINT: &str = "https://google.serper.dev/search";

pub struct SerperProvider {
    client: Client,
    endpoint: String,
}

impl SerperProvider {
    pub const ID: &'static str = "serper";

    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(config.timeout())?,
            endpoint: config.endpoint.clone().unwrap_or_else(|| SERPER_ENDPOINT.to_string()),
        })
    }
}

#[async_trait]
impl SearchProvider for SerperProvider {
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

        let payload = json!({
            "q": query,
            "num": limit,
            "gl": params.country.to_lowercase(),
            "hl": params.lang,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| transport_error(Self::ID, &e, Some(api_key)))?;

        check_status(Self::ID, response.status())?;
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(Self::ID, &e, Some(api_key)))?;
        let parsed: SerperResponse = parse_json(Self::ID, &body)?;

        let results = parsed
            .organic
            .into_iter()
            .enumerate()
            .map(|(i, r)| SearchResult::new(&r.link, &r.title, &r.snippet, Relevance::from_position(i), Self::ID))
            .collect();

        let results = retain_valid(results, limit);
        debug!("Serper returned {} results for '{}'", results.len(), query);
        Ok(results)
    }
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperOrganic>,
}

#[derive(Debug, Deserialize)]
struct SerperOrganic {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}
