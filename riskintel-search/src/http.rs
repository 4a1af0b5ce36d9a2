//! Shared HTTP plumbing for provider backends
//!
//! Client construction and the mapping of HTTP outcomes onto [`ProviderError`].

use reqwest::{Client, StatusCode};
use std::time::Duration;

use crate::ProviderError;

/// User agents for rotation
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:137.0) Gecko/20100101 Firefox/137.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14.7; rv:137.0) Gecko/20100101 Firefox/137.0",
];

/// Get a random user agent
pub fn random_user_agent() -> &'static str {
    use rand::Rng;
    let idx = rand::thread_rng().gen_range(0..USER_AGENTS.len());
    USER_AGENTS[idx]
}

/// Create the HTTP client a provider keeps for its lifetime
pub fn build_client(timeout: Duration) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(random_user_agent())
        .build()
        .map_err(|e| ProviderError::Misconfigured(format!("failed to build HTTP client: {}", e)))
}

/// Map a non-success status onto the failure taxonomy
pub fn check_status(provider: &str, status: StatusCode) -> Result<(), ProviderError> {
    if status.is_success() {
        return Ok(());
    }
    let err = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ProviderError::Unavailable(format!("{}: invalid API key (HTTP {})", provider, status.as_u16()))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            ProviderError::RateLimited(format!("{}: HTTP 429", provider))
        }
        StatusCode::REQUEST_TIMEOUT => {
            ProviderError::Transient(format!("{}: HTTP 408", provider))
        }
        s if s.is_server_error() => {
            ProviderError::Transient(format!("{}: HTTP {}", provider, s.as_u16()))
        }
        s => ProviderError::Misconfigured(format!("{}: HTTP {}", provider, s.as_u16())),
    };
    Err(err)
}

/// Map a transport-level error, with the credential masked
pub fn transport_error(provider: &str, err: &reqwest::Error, secret: Option<&str>) -> ProviderError {
    let message = format!("{}: {}", provider, err);
    let mapped = if err.is_decode() {
        ProviderError::MalformedResponse(message)
    } else if err.is_builder() {
        ProviderError::Misconfigured(message)
    } else {
        ProviderError::Transient(message)
    };
    mapped.redacted(secret)
}

/// Parse a JSON body into the provider's response shape
pub fn parse_json<T: serde::de::DeserializeOwned>(provider: &str, body: &str) -> Result<T, ProviderError> {
    serde_json::from_str(body)
        .map_err(|e| ProviderError::MalformedResponse(format!("{}: {}", provider, e)))
}
