use axum::http::StatusCode;
use axum::response::IntoResponse;

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
