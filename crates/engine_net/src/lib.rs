//! # engine_net
//!
//! TCP transport layer for the entity replication engine.
//!
//! This crate provides:
//!
//! - [`frame`]: 7-digit length-prefixed framing with non-blocking receive.
//! - [`handshake`]: peer introduction and compression negotiation.
//! - [`messages`]: the `create`/`update`/`delete` ops exchanged between peers.
//! - [`codec`]: JSON batch encoding and optional deflate wrapping.
//! - [`connection`]: dialing, admitting, and batch-level send/receive.
//! - [`stats`]: byte and batch counters.
//! - [`error`]: network and protocol error types.

pub mod codec;
pub mod connection;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod messages;
pub mod stats;

pub use codec::{Compression, decode_batch, encode_batch};
pub use connection::{
    Connection, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_SERVER_ADDR, SERVER_ADDR_ENV, accept_peer,
    connect, server_addr_from_env,
};
pub use error::{NetError, ProtocolError};
pub use frame::FramedStream;
pub use messages::{UpdateOp, UpdateType};
pub use stats::TrafficStats;
