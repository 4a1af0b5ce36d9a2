//! Engine assembly
//!
//! Wires settings and credentials into a provider chain, both analyzers
//! and the orchestrator.

use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use riskintel_agents::{
    ContextualAgent, DefinitionError, DefinitionSet, KeywordOverlapScorer, RelevanceScorer,
    StructuralAnalyzer, StructuralError, TierScorer,
};
use riskintel_core::{PortfolioSnapshot, RegistryError, RiskReport};
use riskintel_search::{FactoryError, FallbackChain, ProviderFactory};

use crate::{Credentials, Orchestrator, ScorerKind, Settings, SettingsError};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("invalid search configuration: {0}")]
    Search(#[from] FactoryError),

    #[error("invalid contextual definitions: {0}")]
    Definitions(#[from] DefinitionError),

    #[error("structural analysis failed: {0}")]
    Structural(#[from] StructuralError),

    #[error("failed to merge risks: {0}")]
    Registry(#[from] RegistryError),
}

/// A fully assembled engine, reusable across runs
pub struct Engine {
    chain: Arc<FallbackChain>,
    definitions: DefinitionSet,
    orchestrator: Orchestrator,
}

impl Engine {
    /// Assemble with the built-in search providers
    pub fn from_settings(settings: &Settings, credentials: &Credentials) -> Result<Self, EngineError> {
        Self::with_factory(settings, credentials, ProviderFactory::with_builtin())
    }

    /// Assemble with a caller-supplied provider factory
    pub fn with_factory(
        settings: &Settings,
        credentials: &Credentials,
        factory: ProviderFactory,
    ) -> Result<Self, EngineError> {
        settings.validate_with(&factory.names())?;

        let mut gateway = settings.search.clone();
        credentials.apply(&mut gateway);
        let chain = Arc::new(FallbackChain::from_config(&gateway, &factory)?);

        let definitions = match &settings.contextual.definitions_path {
            Some(path) => {
                info!("Loading contextual definitions from {}", path.display());
                DefinitionSet::load_from_file(path)?
            }
            None => DefinitionSet::load_embedded()?,
        };

        let structural = StructuralAnalyzer::new(settings.thresholds.clone())?;

        let contextual = if settings.contextual.enabled {
            let scorer: Arc<dyn RelevanceScorer> = match settings.contextual.scorer {
                ScorerKind::Tier => Arc::new(TierScorer),
                ScorerKind::KeywordOverlap => Arc::new(KeywordOverlapScorer {
                    keyword_weight: settings.contextual.keyword_weight,
                }),
            };
            info!(
                "Contextual analysis: {} definitions, scorer {}",
                definitions.enabled().count(),
                scorer.name()
            );
            Some(ContextualAgent::new(
                chain.clone(),
                definitions.clone(),
                scorer,
                settings.contextual.agent_settings(),
            ))
        } else {
            None
        };

        let orchestrator = Orchestrator::new(structural, contextual, settings.engine.max_wait());

        Ok(Self {
            chain,
            definitions,
            orchestrator,
        })
    }

    pub fn chain(&self) -> &Arc<FallbackChain> {
        &self.chain
    }

    pub fn definitions(&self) -> &DefinitionSet {
        &self.definitions
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Run both analyses against `snapshot`
    pub async fn run(&self, snapshot: PortfolioSnapshot) -> Result<RiskReport, EngineError> {
        self.orchestrator.run(Arc::new(snapshot)).await
    }
}
