use clap::Parser;
use log::info;
use server::game::SimConfig;
use server::network::Server;
use shared::{GameModeConfig, SpawnPolicy};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Simulation ticks per second
    #[arg(short, long, default_value = "30")]
    tick_rate: u32,

    /// Player snapshot sends per second
    #[arg(long, default_value = "15")]
    client_update_rate: u32,

    /// Maximum simultaneous connections
    #[arg(short, long, default_value = "16")]
    max_clients: usize,

    /// Frags needed to win the round
    #[arg(long, default_value = "15")]
    frag_limit: u32,

    /// Round length in seconds
    #[arg(long, default_value = "600")]
    time_limit: u64,

    /// Seconds between death and respawn
    #[arg(long, default_value = "3")]
    respawn_delay_secs: u64,

    /// Post-spawn protection window in seconds (0 disables it)
    #[arg(long, default_value = "3")]
    invulnerable_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let sim = SimConfig {
        tick_rate: args.tick_rate,
        physics_rate: shared::DEFAULT_PHYSICS_RATE,
        client_update_rate: args.client_update_rate,
        respawn_delay: Duration::from_secs(args.respawn_delay_secs),
        invulnerable: Duration::from_secs(args.invulnerable_secs),
        spawn_policy: SpawnPolicy::Random,
    };
    let mode = GameModeConfig {
        frag_limit: args.frag_limit,
        time_limit: Duration::from_secs(args.time_limit),
        ..GameModeConfig::default()
    };

    info!(
        "starting server: frag limit {}, time limit {}s",
        args.frag_limit, args.time_limit
    );

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&address, args.max_clients, sim, mode).await?;
    server.run().await
}
