//! Run Orchestrator
//!
//! Runs both analysis paths concurrently and merges their output:
//! - Structural analysis runs on the blocking pool and is always awaited
//! - The contextual agent streams events over a channel and is bounded by
//!   a wall-clock ceiling measured from dispatch
//! - Whatever the contextual side reported before the ceiling is kept
//!
//! The merged registry never depends on which worker finishes first.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use riskintel_agents::{ContextualAgent, ContextualReport, StructuralAnalyzer, StructuralError};
use riskintel_core::{
    ContextualStatus, DefinitionOutcome, PortfolioSnapshot, RiskRecord, RiskRegistry, RiskReport,
};

use crate::EngineError;

/// Lifecycle of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    /// Both workers dispatched
    Running,
    AwaitingJoin,
    Merged,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Init => "init",
            Self::Running => "running",
            Self::AwaitingJoin => "awaiting_join",
            Self::Merged => "merged",
            Self::Done => "done",
        };
        write!(f, "{}", s)
    }
}

struct StructuralRun {
    records: Vec<RiskRecord>,
    elapsed: Duration,
}

struct ContextualRun {
    report: ContextualReport,
    status: ContextualStatus,
    elapsed: Duration,
}

impl ContextualRun {
    fn disabled() -> Self {
        Self {
            report: ContextualReport::default(),
            status: ContextualStatus::Disabled,
            elapsed: Duration::ZERO,
        }
    }
}

/// Coordinates one structural and one contextual worker per run
pub struct Orchestrator {
    structural: Arc<StructuralAnalyzer>,
    contextual: Option<Arc<ContextualAgent>>,
    max_wait: Duration,
    phase: Mutex<Phase>,
}

impl Orchestrator {
    /// `contextual: None` runs structural analysis only
    pub fn new(
        structural: StructuralAnalyzer,
        contextual: Option<ContextualAgent>,
        max_wait: Duration,
    ) -> Self {
        Self {
            structural: Arc::new(structural),
            contextual: contextual.map(Arc::new),
            max_wait,
            phase: Mutex::new(Phase::Init),
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phase.lock()
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    pub fn contextual(&self) -> Option<&Arc<ContextualAgent>> {
        self.contextual.as_ref()
    }

    fn transition(&self, next: Phase) {
        let mut phase = self.phase.lock();
        info!("Run phase: {} -> {}", *phase, next);
        *phase = next;
    }

    /// Execute a full run against `snapshot`
    ///
    /// Only structural errors are fatal. Provider failures, contextual
    /// timeouts and contextual crashes are reported in the result.
    pub async fn run(&self, snapshot: Arc<PortfolioSnapshot>) -> Result<RiskReport, EngineError> {
        self.transition(Phase::Init);
        let run_id = Uuid::new_v4();
        snapshot.validate().map_err(StructuralError::from)?;

        let structural = {
            let analyzer = self.structural.clone();
            let snapshot = snapshot.clone();
            tokio::task::spawn_blocking(move || {
                let started = std::time::Instant::now();
                let records = analyzer.analyze(&snapshot);
                (records, started.elapsed())
            })
        };

        let dispatched = Instant::now();
        let contextual = self.contextual.as_ref().map(|agent| {
            let (tx, rx) = mpsc::unbounded_channel();
            let agent = agent.clone();
            let snapshot = snapshot.clone();
            let handle = tokio::spawn(async move { agent.run(&snapshot, tx).await });
            (handle, rx)
        });
        if contextual.is_none() {
            info!("Contextual analysis disabled");
        }
        self.transition(Phase::Running);

        self.transition(Phase::AwaitingJoin);
        let structural = match structural.await {
            Ok((Ok(records), elapsed)) => StructuralRun { records, elapsed },
            Ok((Err(e), _)) => {
                if let Some((handle, _)) = &contextual {
                    handle.abort();
                }
                return Err(e.into());
            }
            Err(e) => {
                error!("Structural worker crashed: {}", e);
                StructuralRun {
                    records: Vec::new(),
                    elapsed: Duration::ZERO,
                }
            }
        };
        info!(
            "Structural analysis: {} risks in {:?}",
            structural.records.len(),
            structural.elapsed
        );

        let contextual = match contextual {
            Some((handle, rx)) => self.join_contextual(handle, rx, dispatched).await,
            None => ContextualRun::disabled(),
        };

        let registry = RiskRegistry::merge(structural.records, contextual.report.records)?;
        self.transition(Phase::Merged);

        let [critical, high, medium, low] = registry.counts();
        info!(
            "Registry: {} critical, {} high, {} medium, {} low",
            critical, high, medium, low
        );

        let report = RiskReport {
            run_id,
            generated_at: chrono::Utc::now(),
            fingerprint: registry.fingerprint(),
            registry,
            contextual_status: contextual.status,
            definitions: contextual.report.outcomes,
            search_history: contextual.report.search_history,
            structural_ms: structural.elapsed.as_millis() as u64,
            contextual_ms: contextual.elapsed.as_millis() as u64,
        };
        self.transition(Phase::Done);
        Ok(report)
    }

    async fn join_contextual(
        &self,
        mut handle: tokio::task::JoinHandle<()>,
        mut rx: mpsc::UnboundedReceiver<riskintel_agents::ContextualEvent>,
        dispatched: Instant,
    ) -> ContextualRun {
        let deadline = dispatched + self.max_wait;
        let status = match timeout_at(deadline, &mut handle).await {
            Ok(Ok(())) => ContextualStatus::Completed,
            Ok(Err(e)) => {
                error!("Contextual worker crashed: {}", e);
                ContextualStatus::Failed
            }
            Err(_) => {
                handle.abort();
                warn!(
                    "Contextual analysis hit the {:?} ceiling, keeping partial results",
                    self.max_wait
                );
                ContextualStatus::TimedOut
            }
        };
        let elapsed = dispatched.elapsed();

        if status == ContextualStatus::Failed {
            return ContextualRun {
                report: ContextualReport::default(),
                status,
                elapsed,
            };
        }

        let mut report = ContextualReport::default();
        while let Ok(event) = rx.try_recv() {
            report.apply(event);
        }

        if status == ContextualStatus::TimedOut {
            self.mark_timed_out(&mut report);
        }
        debug!(
            "Contextual analysis: {} risks, {} outcomes in {:?}",
            report.records.len(),
            report.outcomes.len(),
            elapsed
        );

        ContextualRun {
            report,
            status,
            elapsed,
        }
    }

    /// Give every enabled definition without an outcome a `TimedOut` one
    fn mark_timed_out(&self, report: &mut ContextualReport) {
        let Some(agent) = &self.contextual else {
            return;
        };
        let pending: Vec<String> = agent
            .definitions()
            .enabled()
            .filter(|d| !report.has_outcome(&d.id))
            .map(|d| d.id.clone())
            .collect();
        for id in pending {
            debug!("{} did not finish before the ceiling", id);
            report.outcomes.push((id, DefinitionOutcome::TimedOut));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riskintel_agents::{
        ContextualSettings, DefinitionSet, RelevanceScorer, ThresholdConfig, Tiers, TierScorer,
    };
    use riskintel_core::{
        Account, AccountKind, Custodian, Relevance, RiskId, RiskOrigin, SearchResult, Severity,
    };
    use riskintel_search::testing::{ScriptedProvider, Step};
    use riskintel_search::{FallbackChain, ProviderConfig};

    const DEFINITIONS: &str = r#"
        [[definition]]
        id = "banking"
        category = "contextual"
        queries = ["banking stability"]

        [definition.risk]
        title = "Banking stress"
        description = "Bank warnings"
        probability = "low"
        impact = "high"
        severity = "high"
        category = "concentration"

        [[definition]]
        id = "markets"
        category = "quantitative"
        queries = ["market volatility"]

        [definition.risk]
        title = "Volatility"
        description = "Markets"
        probability = "medium"
        impact = "medium"
        severity = "medium"
        category = "market"
    "#;

    struct PanickingScorer;

    impl RelevanceScorer for PanickingScorer {
        fn name(&self) -> &str {
            "panicking"
        }

        fn score(&self, _result: &SearchResult, _query: &str) -> f64 {
            panic!("scorer exploded");
        }
    }

    fn account(kind: AccountKind, amount: f64) -> Account {
        Account {
            kind,
            label: String::new(),
            amount,
            currency: None,
            funds: Vec::new(),
        }
    }

    /// 80% at Bank X, otherwise unremarkable
    fn snapshot() -> Arc<PortfolioSnapshot> {
        Arc::new(PortfolioSnapshot {
            custodians: vec![
                Custodian {
                    name: "Bank X".into(),
                    jurisdiction: "FR".into(),
                    total: 80_000.0,
                    accounts: vec![
                        account(AccountKind::Current, 20_000.0),
                        account(AccountKind::Savings, 60_000.0),
                    ],
                },
                Custodian {
                    name: "Broker Y".into(),
                    jurisdiction: "LU".into(),
                    total: 20_000.0,
                    accounts: vec![account(AccountKind::Brokerage, 20_000.0)],
                },
            ],
            ..Default::default()
        })
    }

    fn thresholds() -> ThresholdConfig {
        ThresholdConfig {
            custodian_share: Tiers::at_least().critical(70.0),
            jurisdiction_share: Tiers::at_least().critical(90.0),
            ..Default::default()
        }
    }

    fn hits() -> Step {
        Step::Results(vec![
            SearchResult::new("https://a.fr", "a", "", Relevance::High, "fake"),
            SearchResult::new("https://b.fr", "b", "", Relevance::High, "fake"),
        ])
    }

    fn agent(provider: ScriptedProvider, scorer: Arc<dyn RelevanceScorer>) -> ContextualAgent {
        let config = ProviderConfig::default().with_rate_limit(0.0).with_retries(0);
        let chain = FallbackChain::builder()
            .provider(Arc::new(provider), config)
            .build();
        ContextualAgent::new(
            Arc::new(chain),
            DefinitionSet::from_toml_str(DEFINITIONS).unwrap(),
            scorer,
            ContextualSettings::default(),
        )
    }

    fn orchestrator(contextual: Option<ContextualAgent>, max_wait: Duration) -> Orchestrator {
        let structural = StructuralAnalyzer::new(thresholds()).unwrap();
        Orchestrator::new(structural, contextual, max_wait)
    }

    #[tokio::test]
    async fn test_merges_both_paths() {
        let agent = agent(ScriptedProvider::new("fake").always(hits()), Arc::new(TierScorer));
        let orchestrator = orchestrator(Some(agent), Duration::from_secs(30));
        assert_eq!(orchestrator.phase(), Phase::Init);

        let report = orchestrator.run(snapshot()).await.unwrap();
        assert_eq!(orchestrator.phase(), Phase::Done);
        assert_eq!(report.contextual_status, ContextualStatus::Completed);

        let critical: Vec<&str> = report
            .registry
            .bucket(Severity::Critical)
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(critical, vec!["S01/bank-x"]);
        assert_eq!(report.registry.bucket(Severity::Critical)[0].exposure_pct, 80.0);

        assert_eq!(report.registry.bucket(Severity::High)[0].id.as_str(), "C1000");
        assert_eq!(report.registry.bucket(Severity::Medium)[0].id.as_str(), "C1001");
        assert_eq!(report.definitions.len(), 2);
        assert_eq!(report.search_history.len(), 2);
        assert_eq!(report.fingerprint, report.registry.fingerprint());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ceiling_keeps_partial_contextual_results() {
        // Each definition takes 20s; the ceiling is reached during the second
        let provider = ScriptedProvider::new("fake")
            .always(hits())
            .with_delay(Duration::from_secs(20));
        let orchestrator = orchestrator(Some(agent(provider, Arc::new(TierScorer))), Duration::from_secs(30));

        let report = orchestrator.run(snapshot()).await.unwrap();
        assert_eq!(report.contextual_status, ContextualStatus::TimedOut);
        assert_eq!(orchestrator.phase(), Phase::Done);

        assert!(report.registry.contains(&RiskId::structural("S01", Some("Bank X"))));
        let contextual: Vec<&str> = report
            .registry
            .iter()
            .filter(|r| r.origin == RiskOrigin::Contextual)
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(contextual, vec!["C1000"]);

        assert!(matches!(report.outcome("banking"), Some(DefinitionOutcome::Detected { .. })));
        assert_eq!(report.outcome("markets"), Some(&DefinitionOutcome::TimedOut));
        // Only the finished definition's searches are logged
        assert_eq!(report.search_history.len(), 1);
        assert_eq!(report.search_history[0].query, "banking stability");
        assert!(report.contextual_ms >= 30_000);
    }

    #[tokio::test]
    async fn test_contextual_panic_keeps_structural_output() {
        let agent = agent(ScriptedProvider::new("fake").always(hits()), Arc::new(PanickingScorer));
        let orchestrator = orchestrator(Some(agent), Duration::from_secs(30));

        let report = orchestrator.run(snapshot()).await.unwrap();
        assert_eq!(report.contextual_status, ContextualStatus::Failed);
        assert!(report.definitions.is_empty());
        assert!(report.registry.iter().all(|r| r.origin == RiskOrigin::Structural));
        assert_eq!(report.registry.bucket(Severity::Critical).len(), 1);
    }

    #[tokio::test]
    async fn test_disabled_contextual_runs_no_searches() {
        let orchestrator = orchestrator(None, Duration::from_secs(30));
        let report = orchestrator.run(snapshot()).await.unwrap();

        assert_eq!(report.contextual_status, ContextualStatus::Disabled);
        assert!(report.definitions.is_empty());
        assert!(report.search_history.is_empty());
        assert_eq!(report.contextual_ms, 0);
        assert_eq!(report.registry.bucket(Severity::Critical).len(), 1);
    }

    #[tokio::test]
    async fn test_structural_errors_are_fatal() {
        let provider = Arc::new(ScriptedProvider::new("fake").always(hits()));
        let config = ProviderConfig::default().with_rate_limit(0.0);
        let chain = FallbackChain::builder().provider(provider.clone(), config).build();
        let agent = ContextualAgent::new(
            Arc::new(chain),
            DefinitionSet::from_toml_str(DEFINITIONS).unwrap(),
            Arc::new(TierScorer),
            ContextualSettings::default(),
        );
        let orchestrator = orchestrator(Some(agent), Duration::from_secs(30));

        let mut malformed = (*snapshot()).clone();
        malformed.custodians[0].total = f64::NAN;
        let result = orchestrator.run(Arc::new(malformed)).await;

        assert!(matches!(result, Err(EngineError::Structural(_))));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_output_is_deterministic() {
        let run = || async {
            let agent = agent(ScriptedProvider::new("fake").always(hits()), Arc::new(TierScorer));
            orchestrator(Some(agent), Duration::from_secs(30))
                .run(snapshot())
                .await
                .unwrap()
        };
        let first = run().await;
        let second = run().await;
        assert_eq!(first.fingerprint, second.fingerprint);
        assert_ne!(first.run_id, second.run_id);
    }
}
