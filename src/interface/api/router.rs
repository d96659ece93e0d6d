//! API Router configuration

use super::metrics_handler::{metrics_handler, record_http_request};
use super::sip_handler::{
    create_sip_dispatch_rule, create_sip_participant, create_sip_trunk, delete_sip_dispatch_rule,
    delete_sip_participant, delete_sip_trunk, health_check, list_sip_dispatch_rule,
    list_sip_participant, list_sip_trunk, match_sip_dispatch_rule, send_sip_participant_dtmf,
    AppState,
};
use axum::{
    extract::{MatchedPath, Request},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the API router
pub fn build_router(state: AppState, prometheus_handle: PrometheusHandle) -> Router {
    // Health check route
    let health_routes = Router::new().route("/health", get(health_check));

    // Trunk routes
    let trunk_routes = Router::new()
        .route("/sip/trunks", post(create_sip_trunk).get(list_sip_trunk))
        .route("/sip/trunks/:id", delete(delete_sip_trunk));

    // Dispatch rule routes
    let rule_routes = Router::new()
        .route(
            "/sip/dispatch-rules",
            post(create_sip_dispatch_rule).get(list_sip_dispatch_rule),
        )
        .route("/sip/dispatch-rules/:id", delete(delete_sip_dispatch_rule))
        .route("/sip/dispatch", post(match_sip_dispatch_rule));

    // Participant routes
    let participant_routes = Router::new()
        .route(
            "/sip/participants",
            post(create_sip_participant).get(list_sip_participant),
        )
        .route("/sip/participants/:id", delete(delete_sip_participant))
        .route("/sip/participants/:id/dtmf", post(send_sip_participant_dtmf));

    // Metrics route (separate state)
    let metrics_routes = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(prometheus_handle);

    // Combine routes with state
    Router::new()
        .merge(health_routes)
        .merge(trunk_routes)
        .merge(rule_routes)
        .merge(participant_routes)
        .with_state(state)
        .merge(metrics_routes)
        .layer(middleware::from_fn(track_metrics))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

async fn track_metrics(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let response = next.run(req).await;
    record_http_request(&method, &path, response.status().as_u16(), start.elapsed());
    response
}
