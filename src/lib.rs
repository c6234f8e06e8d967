//! Trade Decision Router
//!
//! The decision-routing core of a trading assistant:
//! - Validates trade intents and risk profiles against configurable policy
//! - Synthesizes deterministic execution plans before any submission
//! - Produces risk-scored, optionally personalized portfolio advice
//! - Gates every chain submission behind policy mode and live-execution flags
//! - Records exactly one auditable decision per orchestrated call
//!
//! UNIFIED LOOP:
//! ROUTE → POLICY → DISPATCH (INGEST | ADVISE | EXECUTE) → AUDIT

pub mod advisor;
pub mod api;
pub mod audit;
pub mod config;
pub mod error;
pub mod http;
pub mod ingest;
pub mod logging;
pub mod models;
pub mod narrative;
pub mod orchestrator;
pub mod planner;
pub mod policy;
pub mod scheduler;
pub mod scorecard;
pub mod state;
pub mod submit;

pub use error::Result;

// Re-export common types
pub use config::Settings;
pub use models::*;
pub use orchestrator::DecisionOrchestrator;
