/// Health check endpoints
///
/// # Endpoints
///
/// ```text
/// GET /         # plain-text banner
/// GET /health   # service and store status
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "store": "postgres",
///   "storeStatus": "connected"
/// }
/// ```

use crate::app::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Application version
    pub version: String,

    /// Store backend in use
    pub store: String,

    /// Store connectivity
    pub store_status: String,
}

/// Liveness banner
pub async fn banner() -> &'static str {
    "dTask API is running..."
}

/// Health check handler
///
/// Responds `503 Service Unavailable` with the same body when the store
/// cannot be reached.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (status, code, store_status) = match state.store.ping().await {
        Ok(()) => ("healthy", StatusCode::OK, "connected"),
        Err(e) => {
            tracing::warn!(error = %e, "Store health check failed");
            ("degraded", StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    };

    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            store: state.store.backend().to_string(),
            store_status: store_status.to_string(),
        }),
    )
}
