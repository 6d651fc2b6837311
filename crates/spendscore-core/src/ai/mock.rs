//! Mock backend for testing
//!
//! Provides configurable responses without a running model server. Useful
//! for unit tests, dry runs and exercising the fallback path.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::AIBackend;

const CANNED_REPLY: &str = r#"{"suggestions": [
  {"priority": "High", "text": "Review the lowest-scoring area first and set a monthly cap for it."},
  {"priority": "Medium", "text": "Consolidate overlapping vendors and cancel unused subscriptions."},
  {"priority": "Low", "text": "Keep categorizing every expense so future scores stay accurate."}
]}"#;

#[derive(Clone, Debug)]
enum Reply {
    Canned,
    Fixed(String),
    Unavailable,
}

/// Mock AI backend for testing
///
/// Returns a canned three-suggestion reply by default. Every prompt it
/// receives is recorded so tests can inspect what was sent.
#[derive(Clone)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    reply: Reply,
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a new mock backend (healthy, canned reply)
    pub fn new() -> Self {
        Self {
            healthy: true,
            reply: Reply::Canned,
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Reply with the given text verbatim
    pub fn with_reply(text: impl Into<String>) -> Self {
        Self {
            reply: Reply::Fixed(text.into()),
            ..Self::new()
        }
    }

    /// Fail every generation call
    pub fn unavailable() -> Self {
        Self {
            healthy: false,
            reply: Reply::Unavailable,
            ..Self::new()
        }
    }

    /// Create an unhealthy mock backend that still answers
    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::new()
        }
    }

    /// Sleep for `delay` before answering
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    /// Prompts received so far as `(system, user)` pairs
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn generate(&self, system: &str, user: &str) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((system.to_string(), user.to_string()));
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.reply {
            Reply::Canned => Ok(CANNED_REPLY.to_string()),
            Reply::Fixed(text) => Ok(text.clone()),
            Reply::Unavailable => Err(Error::Ai("mock backend unavailable".into())),
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }
}
