//! RiskIntel Runtime
//!
//! Settings loading, engine assembly and the concurrent run orchestrator.

pub mod settings;
pub mod orchestrator;
pub mod engine;

pub use settings::*;
pub use orchestrator::*;
pub use engine::*;
