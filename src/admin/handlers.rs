use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::http::server::AppState;
use crate::resilience::circuit_breaker::{BreakerSnapshot, CircuitState};

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
    pub routes: usize,
    pub upstreams: usize,
    pub open_breakers: Vec<String>,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let snapshots = state.breakers.snapshots();
    let open_breakers: Vec<String> = snapshots
        .into_iter()
        .filter(|s| s.state != CircuitState::Closed)
        .map(|s| s.name)
        .collect();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: if open_breakers.is_empty() { "operational" } else { "degraded" }.to_string(),
        routes: state.routes.len(),
        upstreams: state.breakers.len(),
        open_breakers,
    })
}

pub async fn get_breakers(State(state): State<AppState>) -> Json<Vec<BreakerSnapshot>> {
    Json(state.breakers.snapshots())
}
