//! Text-generation backend abstraction
//!
//! Recommendations are optionally produced by an external model. This module
//! defines the contract such a backend has to meet; real transports live
//! outside this crate.
//!
//! # Configuration
//!
//! Environment variables:
//! - `AI_BACKEND`: Backend to use (`mock`, `none`). Default: none

mod mock;
pub mod parsing;
pub mod types;

pub use mock::MockBackend;
pub use types::*;

use async_trait::async_trait;

use crate::error::Result;

/// Interface for text-generation backends
///
/// Backends must be Send + Sync so they can be shared across async tasks.
#[async_trait]
pub trait AIBackend: Send + Sync {
    /// Generate a completion for a system and user prompt
    async fn generate(&self, system: &str, user: &str) -> Result<String>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;

    /// Model name used for generation
    fn model(&self) -> &str;
}

/// Select a backend from `AI_BACKEND`
///
/// Returns `None` when no backend is configured; callers then use the
/// built-in fallback recommendations.
pub fn backend_from_env() -> Option<Box<dyn AIBackend>> {
    let backend = std::env::var("AI_BACKEND").unwrap_or_default();

    match backend.trim().to_lowercase().as_str() {
        "mock" => Some(Box::new(MockBackend::new())),
        "" | "none" | "off" => None,
        _ => {
            tracing::warn!(
                backend = %backend,
                "Unknown AI_BACKEND, recommendations will use the built-in fallback"
            );
            None
        }
    }
}
