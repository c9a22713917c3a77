//! API module
//!
//! HTTP API endpoints and middleware.

use std::time::Duration;

use axum::{routing::get, Router};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::service::Services;
use crate::transaction::Backend;

pub mod middleware;
pub mod routes;

pub use routes::create_router;

/// Shared handler state
pub struct AppState<B: Backend> {
    pub services: Services<B>,
}

impl<B: Backend> AppState<B> {
    pub fn new(services: Services<B>) -> Self {
        Self { services }
    }
}

impl<B: Backend> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            services: self.services.clone(),
        }
    }
}

/// Build the application router
///
/// Requests exceeding `request_timeout` are dropped, which rolls back any
/// unit of work they had open.
pub fn build_router<B: Backend>(state: AppState<B>, request_timeout: Duration) -> Router {
    // Axum layers run in reverse order: context -> logging -> handler
    let api_router = create_router::<B>()
        .layer(axum::middleware::from_fn(middleware::logging_middleware))
        .layer(axum::middleware::from_fn(
            middleware::request_context_middleware,
        ));

    Router::new()
        // Health check (no identity headers)
        .route("/health", get(routes::health_check))
        .nest("/api/v1", api_router)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
