use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower::limit::GlobalConcurrencyLimitLayer;

pub mod config;
pub mod errors;
pub mod http;
pub mod logging;
pub mod methods;
pub mod peer;
pub mod rpc;
pub mod server;
pub mod transport;

use config::Limits;
use peer::PeerNode;
use rpc::DispatchTable;

pub use server::{RpcServer, ShutdownHandle};

#[derive(Clone)]
pub struct AppState {
    pub table: Arc<DispatchTable>,
    pub node: Arc<PeerNode>,
    pub limits: Limits,
}

impl AppState {
    pub fn new(table: Arc<DispatchTable>, node: PeerNode, limits: Limits) -> Self {
        Self {
            table,
            node: Arc::new(node),
            limits,
        }
    }
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(http::handlers::health))
        .route("/rpc", post(http::handlers::rpc_endpoint))
        .layer(DefaultBodyLimit::max(state.limits.max_request_bytes))
        .layer(GlobalConcurrencyLimitLayer::new(state.limits.max_connections))
        .layer(middleware::from_fn(logging::request_logging_middleware))
        .with_state(state)
}
