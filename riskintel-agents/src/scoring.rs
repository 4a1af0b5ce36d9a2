//! Relevance scoring of search results
//!
//! The contextual agent only needs a score in `[0, 1]` per result; how it
//! is computed is pluggable.

use std::collections::HashSet;

use riskintel_core::SearchResult;

/// Scores one result against the query text that produced it
pub trait RelevanceScorer: Send + Sync {
    fn name(&self) -> &str;

    fn score(&self, result: &SearchResult, query: &str) -> f64;
}

/// Provider relevance tier only
#[derive(Debug, Clone, Copy, Default)]
pub struct TierScorer;

impl RelevanceScorer for TierScorer {
    fn name(&self) -> &str {
        "tier"
    }

    fn score(&self, result: &SearchResult, _query: &str) -> f64 {
        result.relevance.weight()
    }
}

/// Words too common to count as evidence
const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "les", "des", "une", "pour", "dans", "sur", "par",
    "aux", "avec", "est", "que", "qui", "son", "ses", "leur",
];

/// Share of distinct query keywords found in the title and snippet,
/// blended with the provider tier
#[derive(Debug, Clone, Copy)]
pub struct KeywordOverlapScorer {
    /// Weight of the keyword share; the tier weight gets the rest
    pub keyword_weight: f64,
}

impl Default for KeywordOverlapScorer {
    fn default() -> Self {
        Self { keyword_weight: 0.5 }
    }
}

/// Lowercased alphanumeric tokens of at least three characters
pub fn keywords(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3)
        .map(str::to_lowercase)
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

impl KeywordOverlapScorer {
    pub fn overlap(&self, result: &SearchResult, query: &str) -> f64 {
        let wanted = keywords(query);
        if wanted.is_empty() {
            return 0.0;
        }
        let found = keywords(&format!("{} {}", result.title, result.snippet));
        let hits = wanted.iter().filter(|w| found.contains(*w)).count();
        hits as f64 / wanted.len() as f64
    }
}

impl RelevanceScorer for KeywordOverlapScorer {
    fn name(&self) -> &str {
        "keyword_overlap"
    }

    fn score(&self, result: &SearchResult, query: &str) -> f64 {
        let w = self.keyword_weight.clamp(0.0, 1.0);
        let score = w * self.overlap(result, query) + (1.0 - w) * result.relevance.weight();
        score.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riskintel_core::Relevance;

    fn result(title: &str, snippet: &str, relevance: Relevance) -> SearchResult {
        SearchResult::new("https://example.fr", title, snippet, relevance, "test")
    }

    #[test]
    fn test_tier_scorer() {
        let r = result("t", "", Relevance::Medium);
        assert_eq!(TierScorer.score(&r, "anything"), 0.6);
    }

    #[test]
    fn test_keywords_drop_short_and_stop_words() {
        let words = keywords("Fiscalité de l'assurance-vie pour les épargnants");
        assert!(words.contains("fiscalité"));
        assert!(words.contains("assurance"));
        assert!(words.contains("vie"));
        assert!(!words.contains("pour"));
        assert!(!words.contains("de"));
    }

    #[test]
    fn test_keyword_overlap_blend() {
        let scorer = KeywordOverlapScorer::default();
        let query = "volatilité marchés actions";

        let full = result("Volatilité des marchés", "les actions reculent", Relevance::High);
        assert_eq!(scorer.score(&full, query), 1.0);

        let none = result("Recette de cuisine", "tarte aux pommes", Relevance::Low);
        assert!((scorer.score(&none, query) - 0.15).abs() < 1e-9);

        let partial = result("Marchés en hausse", "", Relevance::Medium);
        let expected = 0.5 * (1.0 / 3.0) + 0.5 * 0.6;
        assert!((scorer.score(&partial, query) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_empty_query_has_no_overlap() {
        let scorer = KeywordOverlapScorer::default();
        let r = result("Anything", "", Relevance::High);
        assert_eq!(scorer.overlap(&r, "a b"), 0.0);
    }
}
