use clap::Parser;
use log::{error, info};
use server::config::RoomConfig;
use server::network::{Server, ServerMessage};
use shared::{CarConfig, MapObject, ObjectType};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Authoritative racing room server")]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Simulation tick interval in milliseconds
    #[arg(short, long, default_value = "15")]
    tick_interval_ms: u64,

    /// Maximum number of players in the room
    #[arg(short = 'l', long, default_value = "4")]
    players_limit: usize,

    /// Milliseconds of silence before a player is removed
    #[arg(short, long, default_value = "12000")]
    idle_time_ms: u64,

    /// Milliseconds between server start and the first tick
    #[arg(short, long, default_value = "0")]
    countdown_ms: u64,
}

/// Static track pieces every room starts with
fn default_track() -> Vec<MapObject> {
    vec![
        MapObject::fixture(1, ObjectType::Terrain),
        MapObject::fixture(2, ObjectType::Road),
        MapObject::fixture(3, ObjectType::Road),
    ]
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();

    let config = RoomConfig {
        countdown: Duration::from_millis(args.countdown_ms),
        players_limit: args.players_limit,
        player_idle_time: Duration::from_millis(args.idle_time_ms),
        tick_interval: Duration::from_millis(args.tick_interval_ms),
        ..RoomConfig::default()
    };

    let addr = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&addr, config, CarConfig::default(), default_track()).await?;

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
            let _ = shutdown.send(ServerMessage::Shutdown);
        }
    });

    if let Err(e) = server.run().await {
        error!("Server error: {}", e);
        return Err(e);
    }

    Ok(())
}
