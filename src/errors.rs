use std::{io, net::SocketAddr, time::Duration};

use thiserror::Error;

use crate::config::ConfigError;

/// Failures of the server lifecycle: binding, accepting and task management.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("listening socket failed: {0}")]
    Accept(#[source] io::Error),
    #[error("server has already been started")]
    AlreadyStarted,
    #[error("server is not running")]
    NotRunning,
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("server task failed: {0}")]
    Task(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Read-side failures of the newline framing.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("request exceeds maximum size of {limit} bytes")]
    TooLarge { limit: usize },
    #[error("connection closed before newline delimiter")]
    Unterminated,
    #[error("timed out after {}s waiting for request", .0.as_secs())]
    Timeout(Duration),
    #[error("failed to read request: {0}")]
    Io(#[from] io::Error),
}

/// A request that could not be turned into an `RpcRequest`.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("parse error: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("request must be a JSON object")]
    NotAnObject,
    #[error("unsupported jsonrpc version: {0}")]
    UnsupportedVersion(String),
    #[error("missing required field `method`")]
    MissingMethod,
    #[error("field `method` must be a string")]
    MethodNotString,
    #[error("missing required field `id`")]
    MissingId,
}

/// Failure raised by a registered handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("invalid params: {0}")]
    InvalidParams(String),
    #[error("{0}")]
    Failed(String),
    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams(message.into())
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}
