use clap::Parser;
use client::input::{Intent, IntentSource};
use client::network::{Client, ClientConfig};
use client::observer::LogObserver;
use log::info;
use std::f32::consts::PI;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Player name to request
    #[arg(short, long, default_value = "bot")]
    name: String,

    /// Preferred team number
    #[arg(short, long)]
    team: Option<u8>,

    /// Keepalive command sends per second
    #[arg(long, default_value = "20")]
    cmd_rate: u32,

    /// Seconds between connect attempts
    #[arg(long, default_value = "3")]
    reconnect_delay_secs: u64,
}

/// Built-in pilot: paces the arena, hops now and then, and fires a
/// short burst towards its direction of travel. Deterministic, so two
/// bots on one server make for a repeatable smoke test.
struct ScriptedPilot {
    step: u32,
}

impl ScriptedPilot {
    fn new() -> Self {
        ScriptedPilot { step: 0 }
    }
}

impl IntentSource for ScriptedPilot {
    fn sample(&mut self) -> Intent {
        let step = self.step;
        self.step = self.step.wrapping_add(1);

        let phase = step % 480;
        let heading_right = phase < 240;
        Intent {
            move_left: !heading_right,
            move_right: heading_right,
            jump: step % 180 == 0,
            crouch: false,
            fire: phase % 120 < 6,
            aim_angle: if heading_right { 0.0 } else { PI },
            switch_slot: None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let cfg = ClientConfig {
        server_addr: args.server,
        name: args.name,
        team: args.team,
        cmd_rate: args.cmd_rate,
        reconnect_delay: Duration::from_secs(args.reconnect_delay_secs),
    };

    info!("starting client for {} as {:?}", cfg.server_addr, cfg.name);

    let mut client = Client::new(cfg, ScriptedPilot::new(), LogObserver).await?;
    client.run().await
}
