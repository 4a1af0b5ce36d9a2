//! Run report handed to the downstream scoring and reporting stage

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{RiskId, RiskRegistry, SearchCategory};

/// What happened to one contextual search definition
///
/// "No risk detected" (`BelowThreshold`, `NoResults`) and "detection could
/// not run" (`Exhausted`, `TimedOut`) are distinct variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DefinitionOutcome {
    /// A contextual risk was emitted
    Detected { risk_id: RiskId },
    /// Providers answered, but corroboration was insufficient
    BelowThreshold {
        qualifying: usize,
        required: usize,
        mean_score: f64,
    },
    /// Providers answered with no results at all
    NoResults,
    /// Every provider in the chain failed
    Exhausted { warning: String },
    /// The portfolio has no exposure to this risk
    NotApplicable,
    /// The orchestrator ceiling was reached before this definition finished
    TimedOut,
}

impl DefinitionOutcome {
    /// True when the definition was evaluated against real search evidence
    pub fn was_evaluated(&self) -> bool {
        matches!(
            self,
            Self::Detected { .. } | Self::BelowThreshold { .. } | Self::NoResults
        )
    }
}

/// Overall state of the contextual worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextualStatus {
    Completed,
    Disabled,
    TimedOut,
    Failed,
}

/// One executed query text, kept for the report appendix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchLogEntry {
    pub category: SearchCategory,
    pub query: String,
    pub provider_used: Option<String>,
    pub results: usize,
    pub at: DateTime<Utc>,
}

/// Final output of one engine run
#[derive(Debug, Clone, Serialize)]
pub struct RiskReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub registry: RiskRegistry,
    pub fingerprint: String,
    pub contextual_status: ContextualStatus,
    /// Per-definition outcomes, in configuration order
    pub definitions: Vec<(String, DefinitionOutcome)>,
    pub search_history: Vec<SearchLogEntry>,
    pub structural_ms: u64,
    pub contextual_ms: u64,
}

impl RiskReport {
    pub fn outcome(&self, definition_id: &str) -> Option<&DefinitionOutcome> {
        self.definitions
            .iter()
            .find(|(id, _)| id == definition_id)
            .map(|(_, outcome)| outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_serialization_is_tagged() {
        let outcome = DefinitionOutcome::BelowThreshold {
            qualifying: 1,
            required: 2,
            mean_score: 0.5,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "below_threshold");
        assert_eq!(json["required"], 2);
    }

    #[test]
    fn test_evaluated_vs_skipped() {
        assert!(DefinitionOutcome::NoResults.was_evaluated());
        assert!(!DefinitionOutcome::TimedOut.was_evaluated());
        assert!(!DefinitionOutcome::Exhausted {
            warning: "all failed".into()
        }
        .was_evaluated());
    }
}
