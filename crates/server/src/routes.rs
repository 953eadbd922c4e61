//! Route configuration.

use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    // Validated at startup to fit in usize.
    let body_limit = usize::try_from(state.config.server.max_upload_bytes).unwrap_or(usize::MAX);

    let api_routes = Router::new()
        .route("/v1/health", get(handlers::health_check))
        .route("/v1/files/{file_id}", get(handlers::get_file))
        .route("/v1/files/{file_id}/name", put(handlers::rename_file))
        .route(
            "/v1/files/{file_id}/upload",
            post(handlers::upload_file).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/v1/files/{file_id}/versions", get(handlers::list_versions))
        .route(
            "/v1/files/{file_id}/versions/{version}",
            get(handlers::get_version),
        )
        .route("/v1/files/{file_id}/download", get(handlers::download_file));

    let mut router = Router::new().merge(api_routes);

    // Unauthenticated; restrict to the Prometheus scraper at the network level.
    if state.config.server.metrics_enabled {
        let metrics_routes = Router::new().route("/metrics", get(metrics_handler));
        router = router.merge(metrics_routes);
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Serve `router` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}
