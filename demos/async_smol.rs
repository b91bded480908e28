use clap::Parser;
use presence_ipc::async_io::smol::SmolRuntime;
use presence_ipc::{ActivityBuilder, AsyncPresence, Result};
use std::time::Duration;

/// Discord Rich Presence Smol Example
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Discord Application Client ID
    #[arg(short, long)]
    client_id: Option<String>,
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
            eprintln!("  - Command line: cargo run --example async_smol --features smol-runtime -- --client-id YOUR_ID");
            eprintln!("  - Environment: DISCORD_CLIENT_ID=YOUR_ID cargo run --example async_smol --features smol-runtime");
            std::process::exit(1);
        });

    smol::block_on(async {
        let mut presence = AsyncPresence::new(client_id, SmolRuntime)?;

        let activity = ActivityBuilder::new()
            .state("Playing a game")
            .details("In the menu")
            .start_timestamp_now()?
            .large_image("car")
            .large_text("This is a large image")
            .build();

        println!(
            "Activity payload: {}",
            serde_json::to_string_pretty(&activity)?
        );

        // Discord may not be running yet; keep trying
        for _ in 0..6 {
            if presence.try_update(&activity).await? {
                println!("Successfully set activity!");
                break;
            }
            println!("Discord is not running, retrying in 5s");
            smol::Timer::after(Duration::from_secs(5)).await;
        }

        smol::Timer::after(Duration::from_secs(30)).await;

        presence.clear().await?;
        presence.close().await;
        Ok(())
    })
}
