//! TCP listener and accept loop

use crate::config::ServerConfig;
use crate::error::SignalingError;
use crate::handler::handle_connection;
use crate::state::ServerState;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// A bound signaling relay, ready to serve
pub struct SignalingServer {
    listener: TcpListener,
    state: ServerState,
}

impl SignalingServer {
    /// Bind the listening socket and create fresh, empty room state
    pub async fn bind(config: &ServerConfig) -> Result<Self, SignalingError> {
        config.validate()?;
        let listener = TcpListener::bind(config.bind).await?;
        Ok(Self {
            listener,
            state: ServerState::new(config.outbox_capacity),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, SignalingError> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle to the server's room state
    pub fn state(&self) -> ServerState {
        self.state.clone()
    }

    /// Serve until the process ends
    pub async fn serve(self) -> Result<(), SignalingError> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Serve until `shutdown` completes
    pub async fn serve_with_shutdown(
        self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), SignalingError> {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, remote_addr)) => {
                        let state = self.state.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, remote_addr, state).await {
                                debug!(%remote_addr, "connection failed: {e}");
                            }
                        });
                    }
                    // Usually transient, e.g. running out of file descriptors
                    Err(e) => warn!("failed to accept connection: {e}"),
                },
            }
        }

        info!(
            rooms = self.state.room_count(),
            connections = self.state.connection_count(),
            "signaling server shutting down"
        );
        Ok(())
    }
}
