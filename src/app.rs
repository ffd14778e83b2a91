use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::handlers::{self, AppState};

/// Maximum accepted request body (lead uploads are the largest payloads).
const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// Dashboard-facing API routes, without state.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/v1/clients/:client_id/subscriptions/timeline",
            get(handlers::get_subscription_timeline),
        )
        .route(
            "/api/v1/clients/:client_id/renewals",
            post(handlers::renew_subscription),
        )
        .route(
            "/api/v1/renewals/next-date",
            get(handlers::preview_next_renewal),
        )
        .route(
            "/api/v1/renewals/scheduled-date",
            get(handlers::preview_scheduled_date),
        )
        .route(
            "/api/v1/leads/:lead_id/stage",
            patch(handlers::update_lead_stage),
        )
        .route("/api/v1/leads/import", post(handlers::import_leads))
        .layer(ServiceBuilder::new().layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)))
}

/// Adds the health check and the outer layers shared by every route.
pub fn finish(api: Router<Arc<AppState>>, state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .merge(api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Full router without rate limiting.
pub fn build_router(state: Arc<AppState>) -> Router {
    finish(api_routes(), state)
}
