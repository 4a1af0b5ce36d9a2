//! Search gateway configuration
//!
//! Built once at startup and shared read-only by every provider slot.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use riskintel_core::SearchCategory;

/// Default rate limit between two calls to the same provider, in seconds
pub const DEFAULT_RATE_LIMIT_SECS: f64 = 1.3;

/// Per-provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub enabled: bool,
    /// Credential, injected from the environment; never serialized
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Base minimum spacing between calls, before jitter
    pub rate_limit_secs: f64,
    /// Per-call timeout
    pub timeout_secs: u64,
    /// Retries after the first attempt, for transient errors only
    pub max_retries: u32,
    pub max_results: usize,
    /// Lower ranks are tried first
    pub priority: u32,
    /// Categories this provider is preferred for when the explicit map is silent
    pub affinity: Vec<SearchCategory>,
    /// Endpoint override (tests, proxies)
    pub endpoint: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            rate_limit_secs: DEFAULT_RATE_LIMIT_SECS,
            timeout_secs: 30,
            max_retries: 2,
            max_results: 10,
            priority: 99,
            affinity: Vec::new(),
            endpoint: None,
        }
    }
}

impl ProviderConfig {
    /// Out-of-range values give no spacing; see [`Self::invalid_reason`]
    pub fn rate_limit(&self) -> Duration {
        Duration::try_from_secs_f64(self.rate_limit_secs).unwrap_or(Duration::ZERO)
    }

    /// Why this configuration cannot be used, if it cannot
    pub fn invalid_reason(&self) -> Option<String> {
        let secs = self.rate_limit_secs;
        if !secs.is_finite() || secs < 0.0 {
            return Some(format!(
                "rate_limit_secs must be finite and non-negative, got {}",
                secs
            ));
        }
        None
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    pub fn with_rate_limit(mut self, secs: f64) -> Self {
        self.rate_limit_secs = secs;
        self
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = Some(endpoint.to_string());
        self
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// Human-readable warnings about risky settings
    pub fn warnings(&self, name: &str, requires_credentials: bool) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.rate_limit_secs < 0.5 {
            warnings.push(format!(
                "{}: rate_limit_secs={} is very low, upstream may block requests",
                name, self.rate_limit_secs
            ));
        }
        if self.timeout_secs < 10 {
            warnings.push(format!("{}: timeout_secs={} is very short", name, self.timeout_secs));
        }
        if self.max_retries > 5 {
            warnings.push(format!(
                "{}: max_retries={} is high, waits may get long",
                name, self.max_retries
            ));
        }
        if requires_credentials && self.enabled && !self.has_credentials() {
            warnings.push(format!(
                "{}: no API key ({}_API_KEY), provider will be unavailable",
                name,
                name.to_uppercase()
            ));
        }
        warnings
    }
}

/// Gateway-wide configuration: provider set, order and routing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Providers in the chain, in global priority order
    pub priority: Vec<String>,
    pub providers: BTreeMap<String, ProviderConfig>,
    /// Preferred provider per category
    pub category_map: BTreeMap<SearchCategory, String>,
    /// Try the next provider after a failure
    pub enable_fallback: bool,
    /// Also try the next provider after an empty success
    pub fallback_on_empty: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            priority: vec![
                "brave".to_string(),
                "serper".to_string(),
                "tavily".to_string(),
                "duckduckgo".to_string(),
            ],
            providers: BTreeMap::new(),
            category_map: BTreeMap::new(),
            enable_fallback: true,
            fallback_on_empty: true,
        }
    }
}

impl GatewayConfig {
    /// Configuration for one provider, falling back to defaults
    pub fn provider(&self, name: &str) -> ProviderConfig {
        self.providers.get(name).cloned().unwrap_or_default()
    }

    /// Inject a credential into a provider's configuration
    pub fn set_api_key(&mut self, name: &str, key: Option<String>) {
        let entry = self.providers.entry(name.to_string()).or_default();
        entry.api_key = key.filter(|k| !k.trim().is_empty());
    }
}
