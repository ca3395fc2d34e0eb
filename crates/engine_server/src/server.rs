//! The server loop.
//!
//! One cycle runs these steps, in order:
//!
//! 1. Receive every complete batch from every client, apply it to the
//!    server's world and copy it into every other client's queue.
//! 2. Drop clients whose connection failed, removing the entities they
//!    owned and queueing a `delete` for each to the remaining clients.
//! 3. Dispatch [`Tick`] and [`NetworkTick`] for server-owned logic, then
//!    detect server-owned changes and queue them to every client.
//! 4. Flush the queue of every client that sent something in step 1.
//! 5. Accept new connections and send each one a full snapshot.
//!
//! Every write to a client is bounded by [`ServerConfig::send_timeout`]. A
//! client that stops reading fails that write and is dropped in the next
//! cycle like any other broken connection.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use engine_net::{Connection, NetError, TrafficStats, UpdateOp, accept_peer};
use engine_world::{EntityTypeMap, NetworkTick, Tick, World};
use futures::FutureExt;
use tokio::net::TcpListener;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::backlog::Backlog;
use crate::config::ServerConfig;

/// The server's own peer id. Entities with this `updater` are simulated by
/// the server.
pub const SERVER_ID: &str = "server";

/// One connected client.
#[derive(Debug)]
struct Peer {
    conn: Connection,
    pending: Backlog,
    sent_this_cycle: bool,
    dead: bool,
}

impl Peer {
    fn new(conn: Connection) -> Self {
        Self {
            conn,
            pending: Backlog::new(),
            sent_this_cycle: false,
            dead: false,
        }
    }

    fn id(&self) -> &str {
        self.conn.peer_id()
    }

    fn fail(&mut self, error: &NetError) {
        if error.is_disconnect() {
            info!(peer = %self.id(), "peer disconnected");
        } else {
            warn!(peer = %self.id(), %error, "connection error, dropping peer");
        }
        self.dead = true;
    }
}

/// Send one batch, giving up once `limit` has passed.
async fn send_within(
    conn: &mut Connection,
    ops: &[UpdateOp],
    limit: Duration,
) -> Result<usize, NetError> {
    tokio::time::timeout(limit, conn.send_batch(ops))
        .await
        .map_err(|_| NetError::SendTimeout(limit))?
}

/// The authoritative relay.
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    listener: TcpListener,
    world: World,
    peers: Vec<Peer>,
    stats: TrafficStats,
    cycles: u64,
}

impl Server {
    /// Bind the listening socket.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind(config: ServerConfig, types: EntityTypeMap) -> Result<Self> {
        let listener = TcpListener::bind(&config.bind_addr)
            .await
            .with_context(|| format!("failed to bind {}", config.bind_addr))?;
        info!(addr = %listener.local_addr()?, "server listening");
        Ok(Self {
            config,
            listener,
            world: World::new(SERVER_ID, types),
            peers: Vec::new(),
            stats: TrafficStats::default(),
            cycles: 0,
        })
    }

    /// The address the listener is bound to.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Returns a reference to the server's world.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Returns a mutable reference to the server's world, for spawning
    /// server-owned entities and subscribing process handlers.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Traffic moved so far, across every connection.
    #[must_use]
    pub fn stats(&self) -> TrafficStats {
        self.stats
    }

    /// Number of connected clients.
    #[must_use]
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Ids of the connected clients, in connection order.
    pub fn peer_ids(&self) -> impl Iterator<Item = &str> {
        self.peers.iter().map(Peer::id)
    }

    /// Number of ops queued for the client `peer_id`, or `None` if it is not
    /// connected.
    #[must_use]
    pub fn backlog_len(&self, peer_id: &str) -> Option<usize> {
        self.peers
            .iter()
            .find(|peer| peer.id() == peer_id)
            .map(|peer| peer.pending.len())
    }

    /// Cycles run so far.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run cycles at the configured rate until `max_ticks` is reached or
    /// Ctrl-C is received.
    ///
    /// # Errors
    ///
    /// Connection failures are contained per client and never end the loop.
    /// This only fails if the runtime cannot install the signal handler.
    pub async fn run(mut self) -> Result<()> {
        let period = self.config.network_interval();
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        info!(
            network_tick_rate = self.config.network_tick_rate,
            max_ticks = self.config.max_ticks,
            "starting server loop"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                signal = &mut shutdown => {
                    signal.context("failed to listen for shutdown signal")?;
                    info!("shutdown requested");
                    break;
                }
            }

            let start = Instant::now();
            self.cycle().await;
            if self.config.is_finished(self.cycles) {
                info!(cycles = self.cycles, "server loop complete");
                break;
            }

            let elapsed = start.elapsed();
            if elapsed > period {
                warn!(
                    cycle = self.cycles,
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = period.as_millis() as u64,
                    "cycle exceeded time budget"
                );
            }
        }

        info!(
            bytes_sent = self.stats.bytes_sent,
            bytes_received = self.stats.bytes_received,
            "server shut down"
        );
        Ok(())
    }

    /// Run one cycle.
    pub async fn cycle(&mut self) {
        self.cycles += 1;
        self.receive_all();
        self.drop_dead();
        self.simulate();
        self.flush().await;
        self.accept_new().await;
    }

    fn receive_all(&mut self) {
        for index in 0..self.peers.len() {
            while let Some(ops) = self.receive_from(index) {
                for (other, peer) in self.peers.iter_mut().enumerate() {
                    if other != index && !peer.dead {
                        peer.pending.extend(ops.iter().cloned());
                    }
                }
            }
        }
    }

    /// Receive and apply one batch from a peer. Returns the ops to relay.
    fn receive_from(&mut self, index: usize) -> Option<Vec<UpdateOp>> {
        let peer = &mut self.peers[index];
        if peer.dead {
            return None;
        }
        let (ops, bytes) = match peer.conn.try_receive_batch() {
            Ok(Some(batch)) => batch,
            Ok(None) => return None,
            Err(error) => {
                peer.fail(&error);
                return None;
            }
        };
        self.stats.record_received(bytes);
        peer.sent_this_cycle = true;

        if let Err(error) = self.world.apply_batch(&ops) {
            warn!(peer = %peer.id(), %error, "rejected batch, dropping peer");
            peer.dead = true;
            return None;
        }
        Some(ops)
    }

    fn drop_dead(&mut self) {
        let (dead, alive): (Vec<Peer>, Vec<Peer>) = std::mem::take(&mut self.peers)
            .into_iter()
            .partition(|peer| peer.dead);
        self.peers = alive;

        for peer in dead {
            let removed = self.world.remove_owned_by(peer.id());
            info!(peer = %peer.id(), entities = removed.len(), "peer dropped");
            for other in &mut self.peers {
                other.pending.extend(removed.iter().cloned().map(UpdateOp::delete));
            }
        }
    }

    fn simulate(&mut self) {
        let dt = self.config.network_interval().as_secs_f32();
        self.world.dispatch(&Tick {
            tick: self.cycles,
            dt,
        });
        self.world.dispatch(&NetworkTick { tick: self.cycles });

        self.world.detect_changes();
        let ops = self.world.drain_outgoing();
        if ops.is_empty() {
            return;
        }
        debug!(
            ops = ops.len(),
            peers = self.peers.len(),
            "fanning out server changes"
        );
        for peer in &mut self.peers {
            peer.pending.extend(ops.iter().cloned());
        }
    }

    async fn flush(&mut self) {
        for peer in &mut self.peers {
            if peer.dead || !std::mem::take(&mut peer.sent_this_cycle) {
                continue;
            }
            let batch = peer.pending.drain();
            match send_within(&mut peer.conn, &batch, self.config.send_timeout).await {
                Ok(bytes) => self.stats.record_sent(bytes),
                Err(error) => peer.fail(&error),
            }
        }
    }

    async fn accept_new(&mut self) {
        while let Some(accepted) = self.listener.accept().now_or_never() {
            let (stream, remote) = match accepted {
                Ok(accepted) => accepted,
                Err(error) => {
                    warn!(%error, "accept failed");
                    break;
                }
            };
            let conn = match accept_peer(
                stream,
                remote,
                self.config.compression,
                self.config.handshake_timeout,
            )
            .await
            {
                Ok(conn) => conn,
                Err(error) => {
                    warn!(%remote, %error, "handshake failed");
                    continue;
                }
            };
            self.admit(conn).await;
        }
    }

    async fn admit(&mut self, mut conn: Connection) {
        let peer_id = conn.peer_id().to_string();
        if peer_id == SERVER_ID || self.peer_ids().any(|id| id == peer_id) {
            warn!(peer = %peer_id, "peer id already in use, rejecting");
            return;
        }

        let snapshot = self.world.snapshot();
        match send_within(&mut conn, &snapshot, self.config.send_timeout).await {
            Ok(bytes) => {
                self.stats.record_sent(bytes);
                info!(peer = %peer_id, entities = snapshot.len(), "snapshot sent");
                self.peers.push(Peer::new(conn));
            }
            Err(error) => warn!(peer = %peer_id, %error, "failed to send snapshot"),
        }
    }
}
