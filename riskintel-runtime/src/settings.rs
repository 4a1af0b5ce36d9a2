//! Engine settings
//!
//! One immutable value loaded from TOML at startup. Every section is
//! optional; credentials never live in the file and are injected from
//! [`Credentials`] when the engine is assembled.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use riskintel_agents::{ContextualSettings, ThresholdConfig};
use riskintel_core::{CONTEXTUAL_ID_BASE, DEFAULT_MIN_SOURCES};
use riskintel_search::{
    BraveProvider, DuckDuckGoProvider, GatewayConfig, SerperProvider, TavilyProvider,
};

/// Provider names known without a custom factory
pub const BUILTIN_PROVIDERS: &[&str] = &[
    BraveProvider::ID,
    SerperProvider::ID,
    TavilyProvider::ID,
    DuckDuckGoProvider::ID,
];

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown provider '{name}' in {section}")]
    UnknownProvider { section: &'static str, name: String },

    #[error("provider '{0}' is listed more than once in search.priority")]
    DuplicateProvider(String),

    #[error("category_map routes {category} to '{name}', which is not in search.priority")]
    UnroutedProvider { category: String, name: String },

    #[error("engine.max_wait_secs must be greater than zero")]
    ZeroMaxWait,

    #[error("search.providers.{name}: {reason}")]
    InvalidProvider { name: String, reason: String },
}

/// `[engine]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Ceiling on the contextual worker, measured from dispatch
    pub max_wait_secs: u64,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self { max_wait_secs: 300 }
    }
}

impl EngineSection {
    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }
}

/// Relevance scorer used by the contextual agent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorerKind {
    /// Provider relevance tier only
    Tier,
    #[default]
    KeywordOverlap,
}

/// `[contextual]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextualSection {
    pub enabled: bool,
    pub min_sources: usize,
    /// Overrides the year substituted into query templates
    pub year: Option<i32>,
    /// Definitions file; the embedded set when unset
    pub definitions_path: Option<PathBuf>,
    pub scorer: ScorerKind,
    /// Keyword share in the blended score (`keyword_overlap` only)
    pub keyword_weight: f64,
}

impl Default for ContextualSection {
    fn default() -> Self {
        Self {
            enabled: true,
            min_sources: DEFAULT_MIN_SOURCES,
            year: None,
            definitions_path: None,
            scorer: ScorerKind::default(),
            keyword_weight: 0.5,
        }
    }
}

impl ContextualSection {
    pub fn agent_settings(&self) -> ContextualSettings {
        ContextualSettings {
            min_sources: self.min_sources,
            id_base: CONTEXTUAL_ID_BASE,
            year: self.year,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineSection,
    pub search: GatewayConfig,
    pub thresholds: ThresholdConfig,
    pub contextual: ContextualSection,
}

impl Settings {
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Check against the built-in provider names
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.validate_with(BUILTIN_PROVIDERS)
    }

    /// Check against an explicit set of registered provider names
    pub fn validate_with(&self, known: &[&str]) -> Result<(), SettingsError> {
        if self.engine.max_wait_secs == 0 {
            return Err(SettingsError::ZeroMaxWait);
        }

        for (i, name) in self.search.priority.iter().enumerate() {
            if !known.contains(&name.as_str()) {
                return Err(SettingsError::UnknownProvider {
                    section: "search.priority",
                    name: name.clone(),
                });
            }
            if self.search.priority[..i].contains(name) {
                return Err(SettingsError::DuplicateProvider(name.clone()));
            }
        }

        for (name, config) in &self.search.providers {
            if !known.contains(&name.as_str()) {
                return Err(SettingsError::UnknownProvider {
                    section: "search.providers",
                    name: name.clone(),
                });
            }
            if let Some(reason) = config.invalid_reason() {
                return Err(SettingsError::InvalidProvider {
                    name: name.clone(),
                    reason,
                });
            }
        }

        for (category, name) in &self.search.category_map {
            if !known.contains(&name.as_str()) {
                return Err(SettingsError::UnknownProvider {
                    section: "search.category_map",
                    name: name.clone(),
                });
            }
            if !self.search.priority.contains(name) {
                return Err(SettingsError::UnroutedProvider {
                    category: category.to_string(),
                    name: name.clone(),
                });
            }
        }

        Ok(())
    }
}

/// API keys supplied outside the settings file
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub brave: Option<String>,
    pub serper: Option<String>,
    pub tavily: Option<String>,
}

impl Credentials {
    /// Inject keys into the matching provider configurations
    pub fn apply(&self, gateway: &mut GatewayConfig) {
        let keys = [
            (BraveProvider::ID, &self.brave),
            (SerperProvider::ID, &self.serper),
            (TavilyProvider::ID, &self.tavily),
        ];
        for (name, key) in keys {
            if key.is_some() {
                gateway.set_api_key(name, key.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riskintel_core::SearchCategory;
    use std::io::Write;

    const SAMPLE: &str = r#"
        [engine]
        max_wait_secs = 30

        [search]
        priority = ["serper", "duckduckgo"]
        fallback_on_empty = true

        [search.providers.serper]
        rate_limit_secs = 2.0
        max_retries = 1

        [search.category_map]
        quantitative = "duckduckgo"

        [thresholds.custodian_share]
        critical = 70.0

        [contextual]
        min_sources = 3
        scorer = "tier"
    "#;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.engine.max_wait(), Duration::from_secs(300));
        assert_eq!(settings.search.priority.len(), 4);
        assert!(settings.contextual.enabled);
        assert_eq!(settings.contextual.scorer, ScorerKind::KeywordOverlap);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_parse_sections() {
        let settings = Settings::from_toml_str(SAMPLE).unwrap();
        assert_eq!(settings.engine.max_wait_secs, 30);
        assert_eq!(settings.search.priority, vec!["serper", "duckduckgo"]);
        assert!(settings.search.fallback_on_empty);
        assert_eq!(settings.search.provider("serper").max_retries, 1);
        assert_eq!(settings.search.provider("serper").rate_limit_secs, 2.0);
        assert_eq!(
            settings.search.category_map.get(&SearchCategory::Quantitative),
            Some(&"duckduckgo".to_string())
        );
        assert_eq!(settings.thresholds.custodian_share.critical, Some(70.0));
        assert_eq!(settings.contextual.min_sources, 3);
        assert_eq!(settings.contextual.agent_settings().min_sources, 3);
        assert_eq!(settings.contextual.scorer, ScorerKind::Tier);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_empty_file_is_default() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings.engine, EngineSection::default());
        assert_eq!(settings.contextual, ContextualSection::default());
    }

    #[test]
    fn test_rejects_unknown_provider() {
        let settings = Settings::from_toml_str(
            r#"
            [search]
            priority = ["brave", "bing"]
            "#,
        )
        .unwrap();
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::UnknownProvider { section: "search.priority", ref name }) if name == "bing"
        ));
    }

    #[test]
    fn test_rejects_unknown_category_route() {
        let settings = Settings::from_toml_str(
            r#"
            [search.category_map]
            factual = "bing"
            "#,
        )
        .unwrap();
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::UnknownProvider { section: "search.category_map", .. })
        ));

        let settings = Settings::from_toml_str(
            r#"
            [search]
            priority = ["brave"]

            [search.category_map]
            factual = "tavily"
            "#,
        )
        .unwrap();
        assert!(matches!(settings.validate(), Err(SettingsError::UnroutedProvider { .. })));
    }

    #[test]
    fn test_rejects_duplicates_and_zero_wait() {
        let settings = Settings::from_toml_str(
            r#"
            [search]
            priority = ["brave", "brave"]
            "#,
        )
        .unwrap();
        assert!(matches!(settings.validate(), Err(SettingsError::DuplicateProvider(_))));

        let settings = Settings::from_toml_str("[engine]\nmax_wait_secs = 0\n").unwrap();
        assert!(matches!(settings.validate(), Err(SettingsError::ZeroMaxWait)));
    }

    #[test]
    fn test_rejects_infinite_rate_limit() {
        let settings = Settings::from_toml_str(
            r#"
            [search.providers.brave]
            rate_limit_secs = inf
            "#,
        )
        .unwrap();
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::InvalidProvider { ref name, .. }) if name == "brave"
        ));

        let settings = Settings::from_toml_str("[search.providers.serper]\nrate_limit_secs = -2.0\n").unwrap();
        assert!(matches!(settings.validate(), Err(SettingsError::InvalidProvider { .. })));
    }

    #[test]
    fn test_custom_provider_names() {
        let settings = Settings::from_toml_str("[search]\npriority = [\"fake\"]\n").unwrap();
        assert!(settings.validate().is_err());
        assert!(settings.validate_with(&["fake"]).is_ok());
    }

    #[test]
    fn test_credentials_are_injected() {
        let mut gateway = GatewayConfig::default();
        let credentials = Credentials {
            serper: Some("serper-key".into()),
            tavily: Some("  ".into()),
            ..Default::default()
        };
        credentials.apply(&mut gateway);

        assert_eq!(gateway.provider("serper").api_key.as_deref(), Some("serper-key"));
        assert!(gateway.provider("tavily").api_key.is_none());
        assert!(gateway.provider("brave").api_key.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let settings = Settings::load_from_file(file.path()).unwrap();
        assert_eq!(settings.engine.max_wait_secs, 30);

        assert!(matches!(
            Settings::load_from_file("/nonexistent/riskintel.toml"),
            Err(SettingsError::Io(_))
        ));
    }
}
