use axum::{routing::get, Router};
use lnk_protocol::endpoints;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the axum router with all Lnk endpoints.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(endpoints::HEALTH, get(handler::health_handler))
        .route(
            endpoints::ADD,
            get(handler::add_query_handler).post(handler::add_form_handler),
        )
        .route(endpoints::REDIRECT, get(handler::redirect_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
