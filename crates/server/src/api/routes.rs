use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{
    handlers, jobs,
    middleware::{auth_middleware, metrics_middleware},
    ws,
};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Everything except health sits behind the authenticator
    let protected_routes = Router::new()
        .route("/config", get(handlers::get_config))
        .route("/status", get(handlers::get_status))
        // Jobs
        .route("/jobs", post(jobs::submit_job))
        .route(
            "/jobs/current",
            get(jobs::get_current_job).delete(jobs::cancel_current_job),
        )
        .route("/jobs/last", get(jobs::get_last_job))
        // Event stream
        .route("/ws", get(ws::ws_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
