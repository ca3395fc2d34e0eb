//! Arena client: joins the arena with one player and its weapon.

use anyhow::Result;
use clap::Parser;
use engine_client::{Client, ClientConfig};
use engine_entity::{Entity, EntityRef, new_entity_id};
use engine_math::Vec2;
use engine_net::Compression;
use engine_world::TickConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

use arena::{DrawList, Player, Weapon, spawn_point, types};

#[derive(Parser)]
#[command(name = "arena_client", about = "Join the arena demo")]
struct Args {
    /// Server address (defaults to ENGINE_SERVER_ADDR, then 127.0.0.1:5560)
    #[arg(short, long)]
    server: Option<String>,

    /// Peer id to introduce ourselves with (defaults to a random one)
    #[arg(long)]
    id: Option<String>,

    /// Simulation ticks per second
    #[arg(long, default_value_t = 60.0)]
    tick_rate: f64,

    /// Network ticks per second
    #[arg(long, default_value_t = 20.0)]
    network_tick_rate: f64,

    /// Stop after this many simulation ticks (0 = run until Ctrl-C)
    #[arg(long, default_value_t = 0)]
    max_ticks: u64,

    /// Do not ask the server for deflate
    #[arg(long)]
    no_deflate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("arena_client=info".parse()?))
        .init();

    let args = Args::parse();
    let peer_id = args
        .id
        .unwrap_or_else(|| format!("player-{}", &new_entity_id()[..8]));

    let tick = TickConfig::default()
        .with_tick_rate(args.tick_rate)
        .with_network_tick_rate(args.network_tick_rate)
        .with_max_ticks(args.max_ticks);
    let mut config = ClientConfig::new(peer_id.clone()).with_tick(tick);
    if let Some(server) = args.server {
        config = config.with_server_addr(server);
    }
    if args.no_deflate {
        config = config.with_compression(Compression::None);
    }

    let mut client = Client::connect(config, types()?).await?;
    let drawables = DrawList::attach(client.world_mut());

    let seed = peer_id.bytes().map(usize::from).sum();
    let mut player = Player::new(&peer_id, spawn_point(seed), Vec2::new(120.0, 90.0));
    let weapon = Weapon::new(&peer_id, player.id());
    player.weapon = Some(EntityRef::new(weapon.id()));
    let player_id = client.world_mut().spawn(player);
    client.world_mut().spawn(weapon);
    client.world().resolve_references();
    info!(peer_id = %peer_id, player = %player_id, drawables = drawables.len(), "joined arena");

    client.run().await?;
    info!(drawables = drawables.len(), "left arena");
    Ok(())
}
