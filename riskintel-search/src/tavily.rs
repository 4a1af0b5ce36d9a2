//! Tavily search backend
//!
//! The credential travels in the JSON body, and results carry a provider
//! score that maps directly onto a relevance tier.

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

pub const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";

pub struct TavilyProvider {
    client: Client,
    endpoint: String,
}

impl TavilyProvider {
    pub const ID: &'static str = "tavily";

    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(config.timeout())?,
            endpoint: config.endpoint.clone().unwrap_or_else(|| TAVILY_ENDPOINT.to_string()),
        })
    }
}

#[async_trait]
impl SearchProvider for TavilyProvider {
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
            "api_key": api_key,
            "query": query,
            "max_results": limit,
            "search_depth": "basic",
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| transport_error(Self::ID, &e, Some(api_key)))?;

        check_status(Self::ID, response.status())?;
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(Self::ID, &e, Some(api_key)))?;
        let parsed: TavilyResponse =
            parse_json(Self::ID, &body).map_err(|e| e.redacted(Some(api_key)))?;

        let results = parsed
            .results
            .into_iter()
            .map(|r| {
                let relevance = match r.score {
                    Some(score) => Relevance::from_score(score),
                    None => Relevance::Medium,
                };
                SearchResult::new(&r.url, &r.title, &r.content, relevance, Self::ID)
            })
            .collect();

        let results = retain_valid(results, limit);
        debug!("Tavily returned {} results for '{}'", results.len(), query);
        Ok(results)
    }
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_score_maps_to_relevance() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "api_key": "tvly-key",
                "query": "fiscalite assurance vie",
                "search_depth": "basic"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    { "title": "A", "url": "https://a.fr", "content": "a", "score": 0.91 },
                    { "title": "B", "url": "https://b.fr", "content": "b", "score": 0.55 },
                    { "title": "C", "url": "https://c.fr", "content": "c", "score": 0.12 },
                    { "title": "D", "url": "https://d.fr", "content": "d" }
                ]
            })))
            .mount(&server)
            .await;

        let config = ProviderConfig::default()
            .with_api_key("tvly-key")
            .with_endpoint(&server.uri());
        let provider = TavilyProvider::new(&config).unwrap();
        let results = provider
            .execute("fiscalite assurance vie", &SearchParams::default(), &config)
            .await
            .unwrap();

        let tiers: Vec<Relevance> = results.iter().map(|r| r.relevance).collect();
        assert_eq!(
            tiers,
            vec![Relevance::High, Relevance::Medium, Relevance::Low, Relevance::Medium]
        );
    }

    #[tokio::test]
    async fn test_snippet_is_truncated() {
        let server = MockServer::start().await;
        let long = "x".repeat(1000);
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{ "title": "Long", "url": "https://l.fr", "content": long, "score": 0.8 }]
            })))
            .mount(&server)
            .await;

        let config = ProviderConfig::default()
            .with_api_key("tvly-key")
            .with_endpoint(&server.uri());
        let provider = TavilyProvider::new(&config).unwrap();
        let results = provider
            .execute("q", &SearchParams::default(), &config)
            .await
            .unwrap();
        assert_eq!(results[0].snippet.chars().count(), riskintel_core::MAX_SNIPPET_CHARS);
    }

    #[tokio::test]
    async fn test_rejected_key_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let config = ProviderConfig::default()
            .with_api_key("tvly-key")
            .with_endpoint(&server.uri());
        let provider = TavilyProvider::new(&config).unwrap();
        let err = provider
            .execute("q", &SearchParams::default(), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));
        assert!(!err.to_string().contains("tvly-key"));
    }
}
