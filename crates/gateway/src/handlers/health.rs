//! Liveness and readiness probes

use std::time::Instant;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub checks: ReadyChecks,
}

#[derive(Serialize)]
pub struct ReadyChecks {
    pub store: StoreCheck,
}

/// Outcome of pinging the phrase store
#[derive(Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StoreCheck {
    Up { latency_ms: u64 },
    Down { error: String },
}

impl StoreCheck {
    fn is_up(&self) -> bool {
        matches!(self, StoreCheck::Up { .. })
    }
}

/// Liveness: the process is serving requests
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: phrasebank_common::VERSION,
    })
}

/// Readiness: 200 while the phrase store answers, 503 otherwise
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let start = Instant::now();

    let store = match state.phrases.ping().await {
        Ok(()) => StoreCheck::Up {
            latency_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        },
        Err(e) => {
            tracing::warn!(error = %e, "Phrase store is unreachable");
            StoreCheck::Down {
                error: e.to_string(),
            }
        }
    };

    let (status, label) = if store.is_up() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    };

    (
        status,
        Json(ReadyResponse {
            status: label,
            checks: ReadyChecks { store },
        }),
    )
}
