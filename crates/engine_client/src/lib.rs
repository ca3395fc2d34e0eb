//! # engine_client
//!
//! Client runtime for the entity replication engine.
//!
//! This crate provides the harness that connects a [`World`] to a server and
//! keeps it in sync. Each client:
//!
//! 1. Connects, introduces itself and negotiates compression.
//! 2. Waits for the server's snapshot and applies it.
//! 3. Runs the simulation tick and the slower network tick side by side.
//! 4. On each network tick: applies whatever the server answered, detects
//!    local changes, and sends them unless a previous batch is still
//!    unanswered.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use engine_client::{Client, ClientConfig};
//! use engine_world::EntityTypeMap;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ClientConfig::new("player-one");
//!     let client = Client::connect(config, EntityTypeMap::new()).await?;
//!     client.run().await
//! }
//! ```
//!
//! [`World`]: engine_world::World

pub mod client;
pub mod config;

pub use client::Client;
pub use config::ClientConfig;
