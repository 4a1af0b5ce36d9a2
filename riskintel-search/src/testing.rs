//! Deterministic in-memory provider
//!
//! Replays scripted responses keyed by query substring. Used by the test
//! suites of every crate in the workspace.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use riskintel_core::{Relevance, SearchResult};

use crate::{ProviderConfig, ProviderError, SearchParams, SearchProvider};

/// One scripted response
#[derive(Debug, Clone)]
pub enum Step {
    Results(Vec<SearchResult>),
    Fail(ProviderError),
}

struct Rule {
    pattern: String,
    steps: Vec<Step>,
}

pub struct ScriptedProvider {
    id: String,
    requires_credentials: bool,
    fallback: Step,
    rules: Mutex<Vec<Rule>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    queries: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    /// Provider that answers every query with no results
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            requires_credentials: false,
            fallback: Step::Results(Vec::new()),
            rules: Mutex::new(Vec::new()),
            delay: None,
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Require an API key, like the credentialed backends
    pub fn credentialed(mut self) -> Self {
        self.requires_credentials = true;
        self
    }

    /// Response for queries no rule matches
    pub fn always(mut self, step: Step) -> Self {
        self.fallback = step;
        self
    }

    pub fn always_fail(self, error: ProviderError) -> Self {
        self.always(Step::Fail(error))
    }

    /// Responses for queries containing `pattern`, replayed in order; the
    /// last step repeats once the sequence is used up
    pub fn on_query(self, pattern: &str, steps: Vec<Step>) -> Self {
        self.rules.lock().push(Rule {
            pattern: pattern.to_string(),
            steps,
        });
        self
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Query texts received, in call order
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }

    /// Results pointing at the given URLs, ranked by position
    pub fn hits(provider: &str, urls: &[&str]) -> Vec<SearchResult> {
        urls.iter()
            .enumerate()
            .map(|(i, url)| {
                SearchResult::new(
                    url,
                    &format!("Result {}", i + 1),
                    "",
                    Relevance::from_position(i),
                    provider,
                )
            })
            .collect()
    }

    fn next_step(&self, query: &str) -> Step {
        let mut rules = self.rules.lock();
        match rules.iter_mut().find(|r| query.contains(&r.pattern)) {
            Some(rule) if rule.steps.len() > 1 => rule.steps.remove(0),
            Some(rule) => rule.steps.first().cloned().unwrap_or_else(|| self.fallback.clone()),
            None => self.fallback.clone(),
        }
    }
}

#[async_trait]
impl SearchProvider for ScriptedProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn requires_credentials(&self) -> bool {
        self.requires_credentials
    }

    async fn execute(
        &self,
        query: &str,
        params: &SearchParams,
        _config: &ProviderConfig,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().push(query.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.next_step(query) {
            Step::Results(results) => Ok(results.into_iter().take(params.max_results).collect()),
            Step::Fail(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_sequence() {
        let provider = ScriptedProvider::new("fake").on_query(
            "rates",
            vec![
                Step::Fail(ProviderError::Transient("503".into())),
                Step::Results(ScriptedProvider::hits("fake", &["https://a"])),
            ],
        );
        let params = SearchParams::default();
        let config = ProviderConfig::default();

        assert!(provider.execute("bank rates", &params, &config).await.is_err());
        assert_eq!(provider.execute("bank rates", &params, &config).await.unwrap().len(), 1);
        assert_eq!(provider.execute("bank rates", &params, &config).await.unwrap().len(), 1);
        assert!(provider.execute("other", &params, &config).await.unwrap().is_empty());
        assert_eq!(provider.calls(), 4);
    }
}
