//! Test utilities for rival-core
//!
//! This module provides testing infrastructure including a mock Ollama server
//! that answers competitor searches over real HTTP.

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::sync::oneshot;

use crate::ai::canned_response;

/// How the mock server answers `/api/generate`
#[derive(Debug, Clone, Copy)]
enum GenerateMode {
    /// Canned competitor JSON derived from the prompt
    Competitors,
    /// Model output that is not JSON at all
    Garbage,
    /// HTTP 503
    Unavailable,
}

/// Mock Ollama server for testing and development
pub struct MockOllamaServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockOllamaServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        Self::start_with(GenerateMode::Competitors).await
    }

    /// Start a server whose generate endpoint returns non-JSON prose
    pub async fn start_garbage() -> Self {
        Self::start_with(GenerateMode::Garbage).await
    }

    /// Start a server whose generate endpoint always fails with 503
    pub async fn start_unavailable() -> Self {
        Self::start_with(GenerateMode::Unavailable).await
    }

    async fn start_with(mode: GenerateMode) -> Self {
        let app = Router::new()
            .route("/api/tags", get(handle_tags))
            .route("/api/generate", post(handle_generate))
            .with_state(mode);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockOllamaServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Ollama tags endpoint response (health check)
async fn handle_tags() -> Json<TagsResponse> {
    Json(TagsResponse {
        models: vec![ModelInfo {
            name: "llama3.2:latest".to_string(),
            modified_at: "2024-01-01T00:00:00Z".to_string(),
            size: 4_000_000_000,
        }],
    })
}

/// Ollama generate endpoint
async fn handle_generate(
    State(mode): State<GenerateMode>,
    Json(request): Json<GenerateRequest>,
) -> Response {
    let response = match mode {
        GenerateMode::Competitors => canned_response(&request.prompt),
        GenerateMode::Garbage => "I am sorry, I cannot browse the web right now.".to_string(),
        GenerateMode::Unavailable => {
            return (StatusCode::SERVICE_UNAVAILABLE, "model is loading").into_response();
        }
    };

    Json(GenerateResponse {
        model: request.model,
        response,
        done: true,
    })
    .into_response()
}

// Request/Response types for the mock server

#[derive(Debug, Serialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Debug, Serialize)]
struct ModelInfo {
    name: String,
    modified_at: String,
    size: u64,
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Serialize)]
struct GenerateResponse {
    model: String,
    response: String,
    done: bool,
}
