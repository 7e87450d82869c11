use clap::Parser;
use log::info;
use server::engine::{EngineConfig, GameEngine};
use server::network::Server;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Simulation refresh rate (ticks per second)
    #[arg(short, long, default_value = "400")]
    tick_rate: u32,

    /// Maximum concurrent player sessions
    #[arg(short, long, default_value = "2")]
    max_players: usize,

    /// Simulation RNG seed (seeded from entropy when omitted)
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let engine = GameEngine::start(EngineConfig {
        tick_rate: args.tick_rate,
        seed: args.seed,
    })?;

    let addr = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&addr, args.max_players, Arc::clone(&engine)).await?;

    tokio::select! {
        result = server.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    engine.shutdown();
    Ok(())
}
