//! Transport-independent request pipeline
//!
//! Turns one raw payload into exactly one response: parse, resolve, invoke, and map
//! every failure to a JSON-RPC error. Nothing here returns an error to the caller.

use std::{sync::Arc, time::Instant};

use serde_json::Value;
use tokio::task::JoinError;
use tracing::{info, warn};

use crate::errors::HandlerError;
use crate::rpc::{
    dispatch::DispatchTable,
    message::{Handler, RpcError, RpcRequest, RpcResponse, METHOD_NOT_FOUND},
};

pub async fn handle_payload(table: &DispatchTable, payload: &[u8]) -> RpcResponse {
    let request = match RpcRequest::parse(payload) {
        Ok(request) => request,
        Err(failure) => {
            warn!(error = %failure.error, "rejected malformed request");
            return RpcResponse::failure(failure.id, RpcError::internal(failure.error.to_string()));
        }
    };

    handle_request(table, request).await
}

pub async fn handle_request(table: &DispatchTable, request: RpcRequest) -> RpcResponse {
    let started_at = Instant::now();
    let RpcRequest {
        method, params, id, ..
    } = request;

    let response = match table.resolve(&method) {
        None => RpcResponse::failure(id, RpcError::method_not_found()),
        Some(handler) => match invoke(handler, params).await {
            Ok(result) => RpcResponse::success(id, result),
            Err(err) => RpcResponse::failure(id, RpcError::internal(err.to_string())),
        },
    };

    let outcome = match response.error() {
        None => "success",
        Some(error) if error.code == METHOD_NOT_FOUND => "not_found",
        Some(_) => "failure",
    };
    info!(
        method = %method,
        id = %response.id(),
        outcome,
        duration_ms = started_at.elapsed().as_millis(),
        "rpc call completed"
    );

    response
}

/// Runs the handler on the blocking pool so a slow handler never stalls the runtime.
async fn invoke(handler: Arc<dyn Handler>, params: Value) -> Result<Value, HandlerError> {
    tokio::task::spawn_blocking(move || handler.call(&params))
        .await
        .unwrap_or_else(|err| Err(HandlerError::Panicked(join_failure_message(err))))
}

fn join_failure_message(err: JoinError) -> String {
    if !err.is_panic() {
        return "handler task was cancelled".to_string();
    }

    let payload = err.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
