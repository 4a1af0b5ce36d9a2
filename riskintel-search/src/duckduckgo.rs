//! DuckDuckGo HTML backend
//!
//! Credential-free; scrapes the lightweight HTML endpoint. Also the
//! natural last resort in a chain.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::debug;

use riskintel_core::{Relevance, SearchResult};

use crate::{
    build_client, check_status, random_user_agent, retain_valid, transport_error, ProviderConfig,
    ProviderError, SearchParams, SearchProvider,
};

pub const DUCKDUCKGO_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

static RESULT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.result").unwrap());
static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.result__a").unwrap());
static SNIPPET_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".result__snippet").unwrap());

/// Markers of the bot-challenge page served instead of results
const ANOMALY_MARKERS: &[&str] = &["anomaly-modal", "Unfortunately, bots use DuckDuckGo too"];

pub struct DuckDuckGoProvider {
    client: Client,
    endpoint: String,
}

impl DuckDuckGoProvider {
    pub const ID: &'static str = "duckduckgo";

    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(config.timeout())?,
            endpoint: config
                .endpoint
                .clone()
                .unwrap_or_else(|| DUCKDUCKGO_ENDPOINT.to_string()),
        })
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoProvider {
    fn id(&self) -> &str {
        Self::ID
    }

    fn requires_credentials(&self) -> bool {
        false
    }

    async fn execute(
        &self,
        query: &str,
        params: &SearchParams,
        config: &ProviderConfig,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        if !config.enabled {
            return Err(ProviderError::Unavailable(format!("{} is disabled", Self::ID)));
        }
        let limit = params.limit(config);
        let region = format!(
            "{}-{}",
            params.country.to_lowercase(),
            params.lang.to_lowercase()
        );

        let response = self
            .client
            .get(&self.endpoint)
            .header("User-Agent", random_user_agent())
            .query(&[("q", query), ("kl", region.as_str())])
            .send()
            .await
            .map_err(|e| transport_error(Self::ID, &e, None))?;

        // The challenge page comes back as 202
        if response.status() == StatusCode::ACCEPTED {
            return Err(ProviderError::RateLimited(format!("{}: bot challenge", Self::ID)));
        }
        check_status(Self::ID, response.status())?;

        let body = response
            .text()
            .await
            .map_err(|e| transport_error(Self::ID, &e, None))?;
        if ANOMALY_MARKERS.iter().any(|m| body.contains(m)) {
            return Err(ProviderError::RateLimited(format!("{}: bot challenge", Self::ID)));
        }

        let results = parse_results(&body, limit);
        debug!("DuckDuckGo returned {} results for '{}'", results.len(), query);
        Ok(results)
    }
}

/// Parse the HTML result page into normalized results
pub fn parse_results(html: &str, limit: usize) -> Vec<SearchResult> {
    let document = Html::parse_document(html);
    let mut results = Vec::new();

    for block in document.select(&RESULT_SELECTOR) {
        if is_ad(&block) {
            continue;
        }
        let Some(link) = block.select(&LINK_SELECTOR).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let title = element_text(&link);
        let snippet = block
            .select(&SNIPPET_SELECTOR)
            .next()
            .map(|s| element_text(&s))
            .unwrap_or_default();

        let position = results.len();
        results.push(SearchResult::new(
            &decode_redirect(href),
            &title,
            &snippet,
            Relevance::from_position(position),
            DuckDuckGoProvider::ID,
        ));
    }

    retain_valid(results, limit)
}

fn is_ad(block: &ElementRef<'_>) -> bool {
    block
        .value()
        .attr("class")
        .is_some_and(|c| c.split_whitespace().any(|cls| cls == "result--ad"))
}

fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Unwrap `//duckduckgo.com/l/?uddg=<encoded>` redirect links
pub fn decode_redirect(href: &str) -> String {
    if let Some(start) = href.find("uddg=") {
        let encoded = &href[start + 5..];
        let encoded = encoded.split('&').next().unwrap_or(encoded);
        if let Ok(decoded) = urlencoding::decode(encoded) {
            return decoded.into_owned();
        }
    }
    if let Some(rest) = href.strip_prefix("//") {
        return format!("https://{}", rest);
    }
    href.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"
        <html><body>
          <div class="result results_links result--ad">
            <a class="result__a" href="https://ads.example/">Sponsored</a>
          </div>
          <div class="result results_links">
            <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.amf-france.org%2Fcrypto&amp;rut=abc">
              Réglementation <b>crypto</b>
            </a>
            <a class="result__snippet">MiCA entre en vigueur</a>
          </div>
          <div class="result results_links">
            <a class="result__a" href="https://www.banque-france.fr/">Banque de France</a>
            <div class="result__snippet">Stabilité financière</div>
          </div>
          <div class="result results_links">
            <span>no link here</span>
          </div>
        </body></html>
    "#;

    #[test]
    fn test_parse_results_skips_ads_and_decodes_links() {
        let results = parse_results(PAGE, 10);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].url, "https://www.amf-france.org/crypto");
        assert_eq!(results[0].title, "Réglementation crypto");
        assert_eq!(results[0].snippet, "MiCA entre en vigueur");
        assert_eq!(results[0].relevance, Relevance::High);
        assert_eq!(results[1].url, "https://www.banque-france.fr/");
    }

    #[test]
    fn test_parse_results_limit() {
        assert_eq!(parse_results(PAGE, 1).len(), 1);
    }

    #[test]
    fn test_decode_redirect() {
        assert_eq!(decode_redirect("https://x.fr/a"), "https://x.fr/a");
        assert_eq!(decode_redirect("//example.org/p"), "https://example.org/p");
        assert_eq!(
            decode_redirect("//duckduckgo.com/l/?uddg=https%3A%2F%2Fa.fr%2F%3Fq%3D1&rut=z"),
            "https://a.fr/?q=1"
        );
    }

    #[tokio::test]
    async fn test_execute_sends_region() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("kl", "fr-fr"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .expect(1)
            .mount(&server)
            .await;

        let config = ProviderConfig::default().with_endpoint(&server.uri());
        let provider = DuckDuckGoProvider::new(&config).unwrap();
        assert!(provider.is_available(&config));
        let results = provider
            .execute("crypto", &SearchParams::default(), &config)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_bot_challenge_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<div class=\"anomaly-modal\">Unfortunately, bots use DuckDuckGo too</div>"),
            )
            .mount(&server)
            .await;

        let config = ProviderConfig::default().with_endpoint(&server.uri());
        let provider = DuckDuckGoProvider::new(&config).unwrap();
        let err = provider
            .execute("q", &SearchParams::default(), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited(_)));
    }
}
