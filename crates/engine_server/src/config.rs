//! Server configuration.

use std::time::Duration;

use engine_net::{
    Compression, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_SERVER_ADDR, server_addr_from_env,
};
use engine_world::interval_for;

/// Default bound on a single batch write to one client.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_millis(250);

/// Configuration for a [`Server`](crate::Server).
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Address to listen on, e.g. `"0.0.0.0:5560"`.
    pub bind_addr: String,
    /// Server cycles per second.
    pub network_tick_rate: f64,
    /// Compression the server is willing to use. A client still has to ask
    /// for it.
    pub compression: Compression,
    /// Bound on the blocking handshake read for each new connection.
    pub handshake_timeout: Duration,
    /// Bound on writing one batch to one client. A client whose socket
    /// stays full for longer is dropped.
    pub send_timeout: Duration,
    /// Maximum number of cycles to run (0 = unlimited).
    pub max_ticks: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_SERVER_ADDR.to_string(),
            network_tick_rate: 20.0,
            compression: Compression::Deflate,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            max_ticks: 0,
        }
    }
}

impl ServerConfig {
    /// Defaults, with the bind address taken from `ENGINE_SERVER_ADDR` if set.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_bind_addr(server_addr_from_env())
    }

    /// Override the bind address.
    #[must_use]
    pub fn with_bind_addr(mut self, bind_addr: impl Into<String>) -> Self {
        self.bind_addr = bind_addr.into();
        self
    }

    /// Set the number of cycles per second.
    #[must_use]
    pub fn with_network_tick_rate(mut self, network_tick_rate: f64) -> Self {
        self.network_tick_rate = network_tick_rate;
        self
    }

    /// Set the compression the server allows.
    #[must_use]
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Set the handshake timeout.
    #[must_use]
    pub fn with_handshake_timeout(mut self, handshake_timeout: Duration) -> Self {
        self.handshake_timeout = handshake_timeout;
        self
    }

    /// Set the per-client send timeout.
    #[must_use]
    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    /// Stop after this many cycles (0 = unlimited).
    #[must_use]
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    /// Time between cycles. Non-positive or non-finite rates fall back to
    /// one cycle per second.
    #[must_use]
    pub fn network_interval(&self) -> Duration {
        interval_for(self.network_tick_rate)
    }

    /// Returns `true` once `cycles` has reached a non-zero `max_ticks`.
    #[must_use]
    pub fn is_finished(&self, cycles: u64) -> bool {
        self.max_ticks > 0 && cycles >= self.max_ticks
    }
}
