//! concord-core - Multi-provider LLM resilience layer
//!
//! This crate provides:
//! - A provider registry with a built-in catalog and environment credentials
//! - Wire adapters for OpenAI-compatible, Anthropic and Google dialects
//! - A single-call executor with budgeted fallback chains
//! - A multi-perspective orchestrator that fans out and synthesizes
//! - A response engine that picks a path via the complexity gate

pub mod adapters;
pub mod budget;
pub mod complexity;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod registry;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use adapters::{DispatchRequest, Dispatcher, HttpDispatcher};
pub use budget::{Budget, MIN_FALLBACK_BUDGET, PRIMARY_SHARE};
pub use complexity::is_complex_enough_for_multi;
pub use config::ConcordConfig;
pub use engine::{Engine, Response};
pub use error::LlmError;
pub use executor::{Executor, ExecutorConfig};
pub use orchestrator::{BatchOutcome, MultiConfig, MultiPerspectiveOrchestrator};
pub use registry::{Credentials, Dialect, ProviderConfig, ProviderRegistry};
pub use types::{
    CallResult, GenerationParams, Message, MultiResult, PerspectiveResult, Role, RoutingDecision,
};
