//! Server lifecycle: registration, start, stop and run.
//!
//! Handlers may only be registered before [`RpcServer::start`]. Starting freezes the
//! dispatch table behind an `Arc`, so connection tasks read it without locking.

use std::{net::SocketAddr, sync::Arc};

use tokio::{sync::watch, task::JoinHandle};
use tracing::info;

use crate::{
    build_app,
    config::{Config, Transport},
    errors::ServerError,
    peer::PeerNode,
    rpc::{DispatchTable, Handler},
    transport::Listener,
    AppState,
};

enum ServerState {
    Idle,
    Running {
        local_addr: SocketAddr,
        identity: PeerNode,
        task: JoinHandle<Result<(), ServerError>>,
    },
    Finished,
}

/// Requests shutdown of the server it was taken from. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    signal: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.signal.send_replace(true);
    }
}

pub struct RpcServer {
    config: Config,
    table: DispatchTable,
    signal: Arc<watch::Sender<bool>>,
    state: ServerState,
}

impl RpcServer {
    pub fn new(config: Config) -> Self {
        let (signal, _) = watch::channel(false);
        Self {
            config,
            table: DispatchTable::new(),
            signal: Arc::new(signal),
            state: ServerState::Idle,
        }
    }

    pub fn register_handler(
        &mut self,
        method: impl Into<String>,
        handler: impl Handler,
    ) -> Result<(), ServerError> {
        if !matches!(self.state, ServerState::Idle) {
            return Err(ServerError::AlreadyStarted);
        }

        self.table.register(method, handler);
        Ok(())
    }

    /// Binds and starts serving in the background, returning the bound address.
    ///
    /// The caller still has to keep the runtime alive, typically through [`RpcServer::run`].
    pub async fn start(&mut self) -> Result<SocketAddr, ServerError> {
        if !matches!(self.state, ServerState::Idle) {
            return Err(ServerError::AlreadyStarted);
        }

        let bind_socket = self.config.bind_socket()?;
        let listener = Listener::bind(bind_socket).await?;
        let local_addr = listener.local_addr();
        let identity = PeerNode::new(
            self.config.node_id.clone(),
            local_addr.ip().to_string(),
            local_addr.port(),
        );
        let table = Arc::new(self.table.clone());
        let limits = self.config.limits;
        let shutdown = self.signal.subscribe();

        info!(
            node = %identity,
            transport = %self.config.transport,
            methods = ?table.methods(),
            "server starting"
        );

        let task = match self.config.transport {
            Transport::Tcp => tokio::spawn(listener.serve(table, limits, shutdown)),
            Transport::Http => {
                let app = build_app(AppState::new(table, identity.clone(), limits));
                tokio::spawn(serve_http(listener, app, shutdown))
            }
        };

        self.state = ServerState::Running {
            local_addr,
            identity,
            task,
        };
        Ok(local_addr)
    }

    /// Stops accepting new connections. In-flight requests run to completion.
    pub fn stop(&self) {
        self.signal.send_replace(true);
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            signal: Arc::clone(&self.signal),
        }
    }

    /// Waits until the server stops accepting, either through [`RpcServer::stop`] or
    /// the listening socket becoming unusable.
    pub async fn run(&mut self) -> Result<(), ServerError> {
        let task = match std::mem::replace(&mut self.state, ServerState::Finished) {
            ServerState::Running { task, .. } => task,
            other => {
                self.state = other;
                return Err(ServerError::NotRunning);
            }
        };

        let result = task
            .await
            .map_err(|err| ServerError::Task(err.to_string()))?;
        info!(node_id = %self.config.node_id, "server stopped");
        result
    }

    pub async fn shutdown(&mut self) -> Result<(), ServerError> {
        self.stop();
        self.run().await
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.state {
            ServerState::Running { local_addr, .. } => Some(*local_addr),
            ServerState::Idle | ServerState::Finished => None,
        }
    }

    pub fn identity(&self) -> Option<&PeerNode> {
        match &self.state {
            ServerState::Running { identity, .. } => Some(identity),
            ServerState::Idle | ServerState::Finished => None,
        }
    }
}

async fn serve_http(
    listener: Listener,
    app: axum::Router,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ServerError> {
    axum::serve(listener.into_inner(), app.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stopped| *stopped).await;
        })
        .await?;
    Ok(())
}
