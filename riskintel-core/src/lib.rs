//! RiskIntel Core - Domain model for hybrid wealth risk detection
//!
//! This crate provides the foundational types shared by every layer:
//! - Read-only portfolio snapshot with derived exposure views
//! - Normalized web search query/result contract
//! - Risk records, severity tiers and the bucketed risk registry
//! - The final run report consumed by scoring and reporting stages

pub mod portfolio;
pub mod search;
pub mod risk;
pub mod report;

pub use portfolio::*;
pub use search::*;
pub use risk::*;
pub use report::*;

/// Minimum number of corroborating sources before a contextual risk is emitted
pub const DEFAULT_MIN_SOURCES: usize = 2;

/// First counter value for contextual risk ids (disjoint from the structural catalog)
pub const CONTEXTUAL_ID_BASE: u32 = 1000;

/// Maximum snippet length kept from a search result
pub const MAX_SNIPPET_CHARS: usize = 300;

/// Default base currency for snapshots that do not declare one
pub const DEFAULT_BASE_CURRENCY: &str = "EUR";
