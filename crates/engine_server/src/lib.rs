//! # engine_server
//!
//! The authoritative side of entity replication.
//!
//! This crate provides:
//!
//! - [`Server`]: the accept/receive/relay/flush loop around one [`World`].
//! - [`ServerConfig`]: bind address, network cadence and connection policy.
//! - [`Backlog`]: the per-client outgoing queue, folded to one op per entity.
//!
//! Every batch a client sends is applied to the server's own world and then
//! relayed to every other client. A client is only answered in a cycle where
//! it sent something. What it misses meanwhile is folded in its [`Backlog`],
//! and a client that stops reading is dropped once a send exceeds
//! [`ServerConfig::send_timeout`].
//!
//! [`World`]: engine_world::World

pub mod backlog;
pub mod config;
pub mod server;

pub use backlog::Backlog;
pub use config::{DEFAULT_SEND_TIMEOUT, ServerConfig};
pub use server::{SERVER_ID, Server};
