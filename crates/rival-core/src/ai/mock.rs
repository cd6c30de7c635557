//! Mock backend for testing
//!
//! Returns scripted responses in order, then falls back to a canned answer
//! derived from the prompt. Every call is counted and its prompt recorded, so
//! tests can assert whether (and how) the collaborator was consulted.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::{AIBackend, CompletionOptions};

/// One scripted answer
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return this text
    Text(String),
    /// Fail as if the server were unreachable
    Unavailable(String),
    /// Wait before returning the text
    Delayed(Duration, String),
}

/// Mock AI backend for testing
#[derive(Clone)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    model: String,
    script: Arc<Mutex<VecDeque<MockResponse>>>,
    calls: Arc<AtomicUsize>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a new mock backend (healthy by default)
    pub fn new() -> Self {
        Self {
            healthy: true,
            model: "mock".to_string(),
            script: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(AtomicUsize::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create an unhealthy mock backend
    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::new()
        }
    }

    /// Create a new instance with a different model name
    ///
    /// The clone shares the script and call counter with the original.
    pub fn with_model(&self, model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..self.clone()
        }
    }

    /// Queue a text response
    pub fn push_text(&self, text: impl Into<String>) -> &Self {
        self.push(MockResponse::Text(text.into()))
    }

    /// Queue any scripted response
    pub fn push(&self, response: MockResponse) -> &Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(response);
        }
        self
    }

    /// Number of completed or attempted calls
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received so far, oldest first
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn next_scripted(&self) -> Option<MockResponse> {
        self.script.lock().ok().and_then(|mut s| s.pop_front())
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn complete(&self, prompt: &str, _options: &CompletionOptions) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        match self.next_scripted() {
            Some(MockResponse::Text(text)) => Ok(text),
            Some(MockResponse::Unavailable(reason)) => Err(Error::SearchUnavailable(reason)),
            Some(MockResponse::Delayed(delay, text)) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            None => Ok(canned_response(prompt)),
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}

/// Build a plausible answer from the price quoted in the prompt
///
/// Offers are priced at 60%, 75% and 90% of the current price.
pub(crate) fn canned_response(prompt: &str) -> String {
    let current = prompt
        .lines()
        .find_map(|line| line.trim().strip_prefix("Current monthly price:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|price| price.parse::<f64>().ok())
        .unwrap_or(10.0);

    let competitors: Vec<serde_json::Value> = [("Budget Direct", 0.6), ("Value Plus", 0.75), ("Smart Choice", 0.9)]
        .iter()
        .map(|(name, factor)| {
            let price = (current * factor * 100.0).round() / 100.0;
            serde_json::json!({
                "name": name,
                "typical_price": price,
                "best_offer": format!("{} standard plan", name),
                "potential_savings": ((current - price) * 12.0 * 100.0).round() / 100.0,
                "pros": ["Lower monthly price"],
                "cons": ["Fewer extras"],
                "website_url": format!("https://www.{}.example", name.to_lowercase().replace(' ', "-")),
                "phone_number": null,
                "contact_email": null,
                "contact_available": false
            })
        })
        .collect();

    serde_json::json!({ "competitors": competitors }).to_string()
}
