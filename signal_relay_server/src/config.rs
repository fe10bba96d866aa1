//! Server configuration from command-line flags and environment

use crate::error::SignalingError;
use crate::state::DEFAULT_OUTBOX_CAPACITY;
use clap::Parser;
use std::net::{Ipv4Addr, SocketAddr};

const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone, Parser)]
#[command(name = "signal-relay")]
#[command(about = "Room-based WebRTC signaling relay", long_about = None, version)]
pub struct ServerConfig {
    /// Address to accept WebSocket connections on
    #[arg(long, env = "SIGNAL_RELAY_BIND", default_value_t = default_bind())]
    pub bind: SocketAddr,

    /// Undelivered events kept per client before the oldest are dropped
    #[arg(long, env = "SIGNAL_RELAY_OUTBOX_CAPACITY", default_value_t = DEFAULT_OUTBOX_CAPACITY)]
    pub outbox_capacity: usize,
}

fn default_bind() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT))
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), SignalingError> {
        if self.outbox_capacity == 0 {
            return Err(SignalingError::Config(
                "outbox capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
