//! Accept loop for the line-delimited TCP front-end.

use std::{io, net::SocketAddr, sync::Arc, time::Duration};

use tokio::{
    net::TcpListener,
    sync::{watch, Semaphore},
};
use tracing::{debug, error, info, warn};

use crate::{config::Limits, errors::ServerError, rpc::DispatchTable};

use super::connection::handle_connection;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(150);
const EXHAUSTED_BACKOFF: Duration = Duration::from_millis(500);

/// How the accept loop reacts to a failed `accept`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AcceptFailure {
    /// The pending connection failed; the next one is unaffected.
    Transient,
    /// Out of descriptors or buffers. Clears once existing connections close.
    Exhausted,
    /// The listening socket itself is unusable.
    Fatal,
}

#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
}

impl Listener {
    pub async fn bind(addr: SocketAddr) -> Result<Self, ServerError> {
        let inner = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = inner.local_addr()?;

        Ok(Self { inner, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn into_inner(self) -> TcpListener {
        self.inner
    }

    /// Accepts connections until `shutdown` flips to `true`.
    ///
    /// Each connection runs on its own task while holding one of `max_connections`
    /// permits; once all permits are taken new connections wait in the kernel
    /// backlog. Connection tasks already running are left to finish.
    pub async fn serve(
        self,
        table: Arc<DispatchTable>,
        limits: Limits,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), ServerError> {
        let permits = Arc::new(Semaphore::new(limits.max_connections));

        info!(
            local_addr = %self.local_addr,
            max_connections = limits.max_connections,
            "tcp listener active"
        );

        loop {
            let permit = tokio::select! {
                biased;
                _ = shutdown.wait_for(|stopped| *stopped) => break,
                permit = Arc::clone(&permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let accepted = tokio::select! {
                biased;
                _ = shutdown.wait_for(|stopped| *stopped) => break,
                accepted = self.inner.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    debug!(peer = %peer, "connection accepted");

                    let table = Arc::clone(&table);
                    tokio::spawn(async move {
                        let _permit = permit;
                        handle_connection(stream, peer, table, limits).await;
                    });
                }
                Err(err) => {
                    drop(permit);
                    let backoff = accept_backoff(err)?;
                    tokio::select! {
                        biased;
                        _ = shutdown.wait_for(|stopped| *stopped) => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }

        info!(local_addr = %self.local_addr, "tcp listener stopped");
        Ok(())
    }
}

/// Returns how long to pause before accepting again, or the error if the listener
/// cannot recover.
fn accept_backoff(err: io::Error) -> Result<Duration, ServerError> {
    match classify(&err) {
        AcceptFailure::Transient => {
            warn!(error = %err, "failed to accept connection");
            Ok(ACCEPT_BACKOFF)
        }
        AcceptFailure::Exhausted => {
            error!(
                error = %err,
                backoff_ms = EXHAUSTED_BACKOFF.as_millis(),
                "accept paused, out of resources"
            );
            Ok(EXHAUSTED_BACKOFF)
        }
        AcceptFailure::Fatal => {
            error!(error = %err, "listening socket is unusable");
            Err(ServerError::Accept(err))
        }
    }
}

fn classify(err: &io::Error) -> AcceptFailure {
    if is_exhaustion(err) {
        return AcceptFailure::Exhausted;
    }
    if is_broken_listener(err) {
        return AcceptFailure::Fatal;
    }
    AcceptFailure::Transient
}

#[cfg(unix)]
fn is_exhaustion(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::ENOMEM)
    ) || err.kind() == io::ErrorKind::OutOfMemory
}

#[cfg(not(unix))]
fn is_exhaustion(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::OutOfMemory
}

#[cfg(unix)]
fn is_broken_listener(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(libc::EBADF | libc::ENOTSOCK | libc::EINVAL | libc::EFAULT)
    )
}

#[cfg(not(unix))]
fn is_broken_listener(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::InvalidInput
}
