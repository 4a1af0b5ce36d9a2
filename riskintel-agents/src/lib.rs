//! RiskIntel Agents
//!
//! The two analysis paths of a run:
//! - **Structural**: deterministic threshold rules over the portfolio snapshot
//! - **Contextual**: web evidence, corroborated across sources, turned into risks
//!
//! ## Configurable definitions
//!
//! Contextual searches are declared in TOML files (`definitions/`).
//! See [`definitions::DefinitionSet`] for loading and validation.

pub mod thresholds;
pub mod structural;
pub mod definitions;
pub mod scoring;
pub mod contextual;

pub use thresholds::*;
pub use structural::*;
pub use definitions::*;
pub use scoring::*;
pub use contextual::*;
