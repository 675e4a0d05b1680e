//! Liveness probes, including the token-gated admin variant.

use crate::auth::{extract_token, require_admin};
use crate::errors::Result;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::AppState;

/// Public health check with environment and server time.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "ok": true,
        "env": state.config.environment,
        "time": Utc::now().to_rfc3339(),
    }))
}

/// Minimal probe for load balancers. Plain text, no body to parse.
pub async fn api_health() -> &'static str {
    "ok"
}

/// Admin-only health check exposing process ID and uptime.
pub async fn admin_health(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Json<Value>> {
    let token = extract_token(&query, &headers);
    require_admin(state.config.admin_token.as_deref(), token.as_deref())?;

    Ok(Json(json!({
        "ok": true,
        "env": state.config.environment,
        "pid": std::process::id(),
        "uptime": state.started_at.elapsed().as_secs(),
        "time": Utc::now().to_rfc3339(),
    })))
}
