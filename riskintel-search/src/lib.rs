//! RiskIntel Search Gateway
//!
//! Provides the multi-provider web search layer:
//! - A common provider contract with a typed failure taxonomy
//! - Brave, Serper, Tavily (credentialed REST) and DuckDuckGo (HTML) backends
//! - Per-provider rate limiting with jitter and bounded retries
//! - An explicit provider factory and a category-aware fallback chain
//! - A scripted in-memory provider for deterministic tests

pub mod config;
pub mod provider;
pub mod http;
pub mod limiter;
pub mod retry;
pub mod brave;
pub mod serper;
pub mod tavily;
pub mod duckduckgo;
pub mod registry;
pub mod chain;
pub mod testing;

pub use config::*;
pub use provider::*;
pub use http::*;
pub use limiter::*;
pub use retry::*;
pub use brave::*;
pub use serper::*;
pub use tavily::*;
pub use duckduckgo::*;
pub use registry::*;
pub use chain::*;
