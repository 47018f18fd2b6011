use axum::{http::HeaderValue, http::StatusCode, response::Json, routing::get, Router};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

/// HTTP surface: liveness plus the CORS policy browsers see.
pub fn router(allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .layer(ServiceBuilder::new().layer(cors_layer(allowed_origins)))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if allowed_origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring unparsable CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

async fn health_check() -> Result<Json<Value>, StatusCode> {
    Ok(Json(json!({ "status": "ok" })))
}
