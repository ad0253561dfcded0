//! HTTP surface of contactly.
//!
//! - GET  /health                     — liveness
//! - GET  /forward-contact/authorize  — redirect to the AWeber consent screen
//! - GET  /forward-contact/auth       — OAuth callback
//! - POST /forward-contact            — relay a form submission

pub mod routes;

use crate::SharedState;
use axum::Router;
use tower_http::trace::TraceLayer;

pub fn router(state: SharedState) -> Router {
    routes::routes(state).layer(TraceLayer::new_for_http())
}
