// src/api/http/health.rs
// Health/readiness endpoints for load balancers: a plain liveness check
// and a readiness check that verifies the database and broker are both
// reachable.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    db: &'static str,
    broker: &'static str,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: &'static str,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = state.db_healthy().await;
    let broker_ok = !state.broker.is_closed();

    let response = HealthResponse {
        status: if db_ok && broker_ok { "healthy" } else { "unhealthy" },
        db: if db_ok { "ok" } else { "error" },
        broker: if broker_ok { "ok" } else { "error" },
    };

    if db_ok && broker_ok {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// GET /health/ready
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.db_healthy().await && !state.broker.is_closed();
    let response = ReadyResponse {
        status: if ready { "ready" } else { "not_ready" },
    };

    if ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_shapes_serialize() {
        let r = HealthResponse {
            status: "healthy",
            db: "ok",
            broker: "ok",
        };
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains("\"status\":\"healthy\""));
    }
}
