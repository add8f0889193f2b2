use clap::Parser;
use client::input::DrivingMode;
use client::network::Client;
use log::info;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Nick shown to other players
    #[arg(short = 'n', long, default_value = "racer")]
    nick: String,

    /// How the car is driven
    #[arg(short = 'm', long, value_enum, default_value_t = DrivingMode::Wander)]
    mode: DrivingMode,

    /// Leave the room after this many seconds
    #[arg(short = 'd', long)]
    duration: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {} ({:?} driving)", args.server, args.mode);

    let mut client = Client::new(&args.server, args.nick, args.mode).await?;
    client.run(args.duration.map(Duration::from_secs)).await?;

    Ok(())
}
