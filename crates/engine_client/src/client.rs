//! The client harness.
//!
//! A client holds a single connection to the server. It never has more than
//! one unanswered batch in flight: after sending it sets `awaiting`, keeps
//! queueing detected changes locally, and only sends again once the server's
//! answer has been received and applied.

use std::time::Instant;

use anyhow::{Context, Result};
use engine_net::{Connection, TrafficStats, connect};
use engine_world::{EntityTypeMap, NetworkTick, Tick, World};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;

/// A connected client and its world.
#[derive(Debug)]
pub struct Client<S = TcpStream> {
    config: ClientConfig,
    conn: Connection<S>,
    world: World,
    awaiting: bool,
    stats: TrafficStats,
    ticks: u64,
    network_ticks: u64,
}

impl Client<TcpStream> {
    /// Connect to the configured server and apply its snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is unreachable, the handshake fails,
    /// or the snapshot cannot be applied.
    pub async fn connect(config: ClientConfig, types: EntityTypeMap) -> Result<Self> {
        let addr = config.server_addr();
        let conn = connect(&addr, &config.peer_id, config.compression, config.handshake_timeout)
            .await
            .with_context(|| format!("failed to connect to {addr}"))?;
        Self::from_connection(config, types, conn).await
    }
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already handshaken connection, waiting for the server's
    /// snapshot and applying it.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection drops before the snapshot arrives
    /// or the snapshot cannot be applied.
    pub async fn from_connection(
        config: ClientConfig,
        types: EntityTypeMap,
        mut conn: Connection<S>,
    ) -> Result<Self> {
        let mut world = World::new(config.peer_id.clone(), types);
        let mut stats = TrafficStats::default();

        let (snapshot, bytes) = conn
            .receive_batch()
            .await
            .context("connection closed before the snapshot arrived")?;
        stats.record_received(bytes);
        world
            .apply_batch(&snapshot)
            .context("failed to apply the server snapshot")?;
        info!(peer_id = %config.peer_id, entities = snapshot.len(), "snapshot applied");

        Ok(Self {
            config,
            conn,
            world,
            awaiting: false,
            stats,
            ticks: 0,
            network_ticks: 0,
        })
    }

    /// This client's peer id.
    #[must_use]
    pub fn peer_id(&self) -> &str {
        &self.config.peer_id
    }

    /// Returns a reference to the world.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Returns a mutable reference to the world.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Traffic moved so far.
    #[must_use]
    pub fn stats(&self) -> TrafficStats {
        self.stats
    }

    /// Returns `true` while a sent batch is still unanswered.
    #[must_use]
    pub fn is_awaiting(&self) -> bool {
        self.awaiting
    }

    /// Simulation ticks run so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Run one simulation tick. Returns the number of handlers that ran.
    pub fn tick(&mut self) -> usize {
        self.ticks += 1;
        self.world.dispatch(&Tick {
            tick: self.ticks,
            dt: self.config.tick.dt(),
        })
    }

    /// Run one network tick.
    ///
    /// 1. Apply the server's answer, if it has arrived.
    /// 2. Dispatch [`NetworkTick`].
    /// 3. Detect changes to locally owned entities.
    /// 4. Send the queued ops, unless a previous batch is unanswered.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is lost or the server sends a batch
    /// that cannot be applied. Both are fatal to the client.
    pub async fn network_tick(&mut self) -> Result<()> {
        self.network_ticks += 1;

        while let Some((ops, bytes)) = self
            .conn
            .try_receive_batch()
            .context("lost connection to server")?
        {
            self.stats.record_received(bytes);
            self.awaiting = false;
            self.world
                .apply_batch(&ops)
                .context("server sent a batch that could not be applied")?;
        }

        self.world.dispatch(&NetworkTick {
            tick: self.network_ticks,
        });
        self.world.detect_changes();

        if self.awaiting {
            debug!(queued = self.world.outgoing().len(), "previous batch unanswered, holding");
            return Ok(());
        }
        let batch = self.world.drain_outgoing();
        let bytes = self
            .conn
            .send_batch(&batch)
            .await
            .context("lost connection to server")?;
        self.stats.record_sent(bytes);
        self.awaiting = true;
        Ok(())
    }

    /// Run both cadences until `max_ticks` simulation ticks have run or
    /// Ctrl-C is received.
    ///
    /// # Errors
    ///
    /// Returns an error if a network tick fails.
    pub async fn run(mut self) -> Result<()> {
        let mut sim = tokio::time::interval(self.config.tick.tick_interval());
        sim.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut net = tokio::time::interval(self.config.tick.network_interval());
        net.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        info!(
            peer_id = %self.config.peer_id,
            tick_rate = self.config.tick.tick_rate,
            network_tick_rate = self.config.tick.network_tick_rate,
            max_ticks = self.config.tick.max_ticks,
            "starting client loop"
        );

        let budget = self.config.tick.tick_interval();
        loop {
            tokio::select! {
                _ = sim.tick() => {
                    let start = Instant::now();
                    self.tick();
                    if self.config.tick.is_finished(self.ticks) {
                        info!(ticks = self.ticks, "client loop complete");
                        break;
                    }
                    let elapsed = start.elapsed();
                    if elapsed > budget {
                        warn!(
                            tick = self.ticks,
                            elapsed_ms = elapsed.as_millis() as u64,
                            budget_ms = budget.as_millis() as u64,
                            "tick exceeded time budget"
                        );
                    }
                }
                _ = net.tick() => self.network_tick().await?,
                signal = &mut shutdown => {
                    signal.context("failed to listen for shutdown signal")?;
                    info!("shutdown requested");
                    break;
                }
            }
        }

        info!(
            bytes_sent = self.stats.bytes_sent,
            bytes_received = self.stats.bytes_received,
            batches_sent = self.stats.batches_sent,
            "client shut down"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use engine_entity::{
        AttrMap, Entity, EntityError, EntityId, EntityKind, Networked, field, update_field,
    };
    use engine_net::{Compression, FramedStream, UpdateOp, UpdateType};
    use engine_world::{EventBus, EventContext, Replicated};
    use serde_json::{Value, json};
    use tokio::io::{DuplexStream, duplex};

    use super::*;

    /// Counts the simulation ticks it was allowed to run.
    #[derive(Debug)]
    struct Counter {
        net: Networked,
        count: u64,
    }

    impl Entity for Counter {
        fn networked(&self) -> &Networked {
            &self.net
        }
        fn networked_mut(&mut self) -> &mut Networked {
            &mut self.net
        }
        fn serialize(&self) -> AttrMap {
            let mut map = self.net.to_map();
            map.insert("count".into(), self.count.into());
            map
        }
        fn update(&mut self, data: &AttrMap) -> Result<(), EntityError> {
            self.net.apply(data)?;
            update_field(data, "count", &mut self.count)?;
            Ok(())
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    impl EntityKind for Counter {
        const TYPE_TAG: &'static str = "counter";

        fn deserialize(id: EntityId, data: &AttrMap) -> Result<Self, EntityError> {
            Ok(Self {
                net: Networked::from_map(id, data)?,
                count: field(data, "count")?,
            })
        }
    }

    impl Replicated for Counter {
        fn subscribe(id: &str, bus: &mut EventBus) {
            bus.subscribe_as(id, |_: &Tick, counter: &mut Counter, _: &mut EventContext<'_>| {
                counter.count += 1;
            });
        }
    }

    fn counter(id: &str, updater: &str) -> Counter {
        Counter {
            net: Networked::new(id, updater),
            count: 0,
        }
    }

    fn counter_create(id: &str, updater: &str, count: u64) -> UpdateOp {
        let data = match json!({"updater": updater, "count": count}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        UpdateOp::create(id, "counter", data)
    }

    fn count_of(client: &Client<DuplexStream>, id: &str) -> u64 {
        let handle = client.world().get(id).unwrap();
        let entity = handle.borrow();
        entity.downcast_ref::<Counter>().unwrap().count
    }

    /// A client wired to an in-memory server end that has already sent
    /// `snapshot`.
    async fn client(snapshot: &[UpdateOp]) -> (Client<DuplexStream>, Connection<DuplexStream>) {
        let (a, b) = duplex(64 * 1024);
        let mut server = Connection::new("c1", FramedStream::new(b, Compression::None));
        server.send_batch(snapshot).await.unwrap();

        let types = EntityTypeMap::new().with::<Counter>().unwrap();
        let conn = Connection::new("c1", FramedStream::new(a, Compression::None));
        let client = Client::from_connection(ClientConfig::new("c1"), types, conn)
            .await
            .unwrap();
        (client, server)
    }

    #[tokio::test]
    async fn test_snapshot_applied_on_connect() {
        let (client, _server) = client(&[counter_create("k9", "c2", 4)]).await;
        assert_eq!(count_of(&client, "k9"), 4);
        assert_eq!(client.stats().batches_received, 1);
        assert!(!client.is_awaiting());
    }

    #[tokio::test]
    async fn test_tick_runs_only_owned_logic() {
        let (mut client, _server) = client(&[counter_create("k9", "c2", 0)]).await;
        client.world_mut().spawn(counter("k1", "c1"));

        assert_eq!(client.tick(), 1);
        client.tick();
        assert_eq!(count_of(&client, "k1"), 2);
        assert_eq!(count_of(&client, "k9"), 0);
    }

    #[tokio::test]
    async fn test_one_batch_in_flight() {
        let (mut client, mut server) = client(&[]).await;
        client.world_mut().spawn(counter("k1", "c1"));

        client.network_tick().await.unwrap();
        assert!(client.is_awaiting());
        let (first, _) = server.try_receive_batch().unwrap().unwrap();
        assert_eq!(first, [counter_create("k1", "c1", 0)]);

        // Changes keep being detected while the first batch is unanswered.
        client.tick();
        client.network_tick().await.unwrap();
        assert!(server.try_receive_batch().unwrap().is_none());
        assert_eq!(client.world().outgoing().len(), 1);

        server.send_batch(&[]).await.unwrap();
        client.network_tick().await.unwrap();
        let (second, _) = server.try_receive_batch().unwrap().unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].update_type, UpdateType::Update);
        assert_eq!(second[0].data.as_ref().unwrap()["count"], json!(1));
        assert_eq!(client.stats().batches_sent, 2);
    }

    #[tokio::test]
    async fn test_empty_batch_sent_when_idle() {
        let (mut client, mut server) = client(&[]).await;
        client.network_tick().await.unwrap();
        let (batch, _) = server.try_receive_batch().unwrap().unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn test_received_state_is_not_echoed() {
        let (mut client, mut server) = client(&[]).await;
        client.network_tick().await.unwrap();
        server.try_receive_batch().unwrap().unwrap();

        server
            .send_batch(&[counter_create("k9", "c2", 3)])
            .await
            .unwrap();
        client.network_tick().await.unwrap();
        assert_eq!(count_of(&client, "k9"), 3);
        let (batch, _) = server.try_receive_batch().unwrap().unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_is_fatal() {
        let (mut client, server) = client(&[]).await;
        drop(server);
        assert!(client.network_tick().await.is_err());
    }
}
