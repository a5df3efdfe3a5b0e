//! Axum handlers for the HTTP front-end
//!
//! `POST /rpc` runs the body through the same pipeline as the TCP front-end. JSON-RPC
//! failures are reported inside a 200 response, never as HTTP status codes.

use axum::{body::Bytes, extract::State, Json};
use serde::Serialize;

use crate::{
    peer::PeerNode,
    rpc::{processor, RpcResponse},
    AppState,
};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub node: PeerNode,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        node: state.node.as_ref().clone(),
    })
}

pub async fn rpc_endpoint(State(state): State<AppState>, body: Bytes) -> Json<RpcResponse> {
    Json(processor::handle_payload(&state.table, &body).await)
}
