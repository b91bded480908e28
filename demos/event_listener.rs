use clap::Parser;
use presence_ipc::{ActivityBuilder, DiscordIpcClient, Result};
use serde_json::Value;
use std::time::Duration;

/// Listen for join and spectate events on a Rich Presence party
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Discord Application Client ID
    #[arg(short, long)]
    client_id: Option<String>,

    /// Events to subscribe to
    #[arg(short, long, default_values = ["ACTIVITY_JOIN", "ACTIVITY_SPECTATE", "ACTIVITY_JOIN_REQUEST"])]
    events: Vec<String>,
}

fn main() -> Result {
    env_logger::init();
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let client_id = args
        .client_id
        .or_else(|| std::env::var("DISCORD_CLIENT_ID").ok())
        .unwrap_or_else(|| {
            eprintln!("Error: DISCORD_CLIENT_ID is required!");
            eprintln!("  - Command line: cargo run --example event_listener -- --client-id YOUR_ID");
            eprintln!("  - Environment: DISCORD_CLIENT_ID=YOUR_ID cargo run --example event_listener");
            std::process::exit(1);
        });

    let mut client = DiscordIpcClient::new(client_id)?;
    client.connect()?;

    // Join and spectate buttons only appear for activities with a party and secrets
    let activity = ActivityBuilder::new()
        .state("In a lobby")
        .details("Waiting for players")
        .party("demo-party", 1, 4)
        .join_secret("demo-join-secret")
        .spectate_secret("demo-spectate-secret")
        .build();
    client.set_activity(&activity)?;

    for event in &args.events {
        let name = event.clone();
        client.register_event(
            event,
            move |data: &Value| println!("{} -> {}", name, data),
            None,
        )?;
        println!("Subscribed to {}", event);
    }

    println!("Listening for events, press Ctrl+C to stop");
    loop {
        match client.poll_events(Duration::from_secs(5)) {
            Ok(0) => {}
            Ok(n) => println!("Handled {} event(s)", n),
            Err(e) if e.is_recoverable() => {
                eprintln!("Connection lost ({}), reconnecting...", e);
                std::thread::sleep(Duration::from_secs(2));
                if let Err(e) = client.reconnect() {
                    eprintln!("Reconnect failed: {}", e);
                    continue;
                }
                client.set_activity(&activity)?;
            }
            Err(e) => return Err(e),
        }
    }
}
