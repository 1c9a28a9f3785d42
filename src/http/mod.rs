//! HTTP Module
//!
//! JSON front end over [`KvService`](crate::service::KvService).
//!
//! ## Routes
//! ```text
//! POST   /kv        {"key": "...", "value": <json>}  -> 201
//! GET    /kv/{id}                                    -> 200
//! PUT    /kv/{id}   {"value": <json>}                -> 200
//! DELETE /kv/{id}                                    -> 200
//! ```
//!
//! Errors are `{"error": "..."}` with 400, 404, 409 or 500.

mod dto;
mod handlers;

use std::future::Future;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::network::Session;
use crate::service::KvService;

pub use dto::{CreateRequest, ErrorResponse, RecordResponse, UpdateRequest, WriteResponse};
pub use handlers::ApiError;

/// Build the router for `service`
pub fn router<S: Session + 'static>(service: Arc<KvService<S>>) -> Router {
    Router::new()
        .route("/kv", post(handlers::create::<S>))
        .route(
            "/kv/{id}",
            get(handlers::read::<S>)
                .put(handlers::update::<S>)
                .delete(handlers::remove::<S>),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Serve until `shutdown` resolves, then drain in-flight requests
pub async fn serve<S, F>(
    listener: TcpListener,
    service: Arc<KvService<S>>,
    shutdown: F,
) -> std::io::Result<()>
where
    S: Session + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("HTTP server listening on {}", addr);
    }

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await
}
