pub mod error;
pub mod health;
pub mod response;
pub mod status;

use crate::domain::Command;
use crate::engine::Engine;
use crate::store::FileStore;
use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared state for the read-only HTTP surface. Cloned per-request by
/// axum; cheap, since everything inside is an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine<FileStore>>,
    pub last_command: Arc<RwLock<Option<Command>>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/api/v1/status", get(status::get_status))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(feature = "swagger")]
pub fn with_swagger(app: Router) -> Router {
    use utoipa::OpenApi;
    use utoipa_swagger_ui::SwaggerUi;

    #[derive(OpenApi)]
    #[openapi(paths())]
    struct ApiDoc;

    app.merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
}

#[cfg(feature = "metrics")]
pub fn with_metrics(app: Router) -> Router {
    use axum_prometheus::PrometheusMetricLayer;
    let (layer, handle) = PrometheusMetricLayer::pair();
    app.layer(layer).route(
        "/metrics",
        get(move || async move { handle.render() }),
    )
}
