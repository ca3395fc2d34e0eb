//! Arena server: relays every client's entities and runs a few bots.

use anyhow::Result;
use clap::Parser;
use engine_math::Vec2;
use engine_net::Compression;
use engine_server::{SERVER_ID, Server, ServerConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

use arena::{Player, spawn_point, types};

#[derive(Parser)]
#[command(name = "arena_server", about = "Authoritative relay server for the arena demo")]
struct Args {
    /// Address to listen on (defaults to ENGINE_SERVER_ADDR, then 127.0.0.1:5560)
    #[arg(short, long)]
    bind: Option<String>,

    /// Server cycles per second
    #[arg(long, default_value_t = 20.0)]
    tick_rate: f64,

    /// Stop after this many cycles (0 = run until Ctrl-C)
    #[arg(long, default_value_t = 0)]
    max_ticks: u64,

    /// Refuse deflate even when a client asks for it
    #[arg(long)]
    no_deflate: bool,

    /// Number of server-owned players wandering the arena
    #[arg(long, default_value_t = 2)]
    bots: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("arena_server=info".parse()?))
        .init();

    let args = Args::parse();

    let mut config = ServerConfig::from_env()
        .with_network_tick_rate(args.tick_rate)
        .with_max_ticks(args.max_ticks);
    if let Some(bind) = args.bind {
        config = config.with_bind_addr(bind);
    }
    if args.no_deflate {
        config = config.with_compression(Compression::None);
    }

    let mut server = Server::bind(config, types()?).await?;
    for seed in 0..args.bots {
        let heading = Vec2::from_angle(seed as f32 * 1.3);
        let bot = Player::new(SERVER_ID, spawn_point(seed * 7), heading * 80.0);
        server.world_mut().spawn(bot);
    }
    info!(bots = args.bots, addr = %server.local_addr()?, "arena server ready");

    server.run().await
}
