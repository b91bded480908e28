use clap::Parser;
use presence_ipc::{ActivityBuilder, ActivityType, DiscordIpcClient, Result};
use std::time::Duration;

/// Discord Rich Presence Basic Example
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Discord Application Client ID
    #[arg(short, long)]
    client_id: Option<String>,

    /// Seconds to keep the activity before clearing it
    #[arg(short, long, default_value_t = 30)]
    seconds: u64,
}

fn main() -> Result {
    env_logger::init();
    // Load .env file if it exists (optional)
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let client_id = args
        .client_id
        .or_else(|| std::env::var("DISCORD_CLIENT_ID").ok())
        .unwrap_or_else(|| {
            eprintln!("Error: DISCORD_CLIENT_ID is required!");
            eprintln!("Provide it via:");
            eprintln!("  - Command line: cargo run --example basic -- --client-id YOUR_ID");
            eprintln!("  - Environment: DISCORD_CLIENT_ID=YOUR_ID cargo run --example basic");
            std::process::exit(1);
        });

    let mut client = DiscordIpcClient::new(client_id)?;

    // Perform handshake
    let ready = client.connect()?;
    if let Some(user) = ready.get("user").and_then(|user| user.get("username")) {
        println!("Connected as {}", user);
    }

    let activity = ActivityBuilder::new()
        .activity_type(ActivityType::Playing)
        .state("Playing a game")
        .details("In the menu")
        .start_timestamp_now()?
        .large_image("car")
        .large_text("This is a large image")
        .button("Repository", "https://github.com")
        .build_validated()?;

    client.set_activity(&activity)?;
    println!("Activity set, keeping it for {}s", args.seconds);

    std::thread::sleep(Duration::from_secs(args.seconds));

    client.clear_activity()?;

    // Connection is closed when client is dropped
    Ok(())
}
