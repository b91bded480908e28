use clap::Parser;
use presence_ipc::async_io::tokio::client::new_discord_ipc_client;
use presence_ipc::retry::{with_retry_async, RetryConfig};
use presence_ipc::{ActivityBuilder, Result, SessionState};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};

/// Discord Rich Presence Async Tokio Reconnection Example
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Discord Application Client ID
    #[arg(short, long)]
    client_id: Option<String>,

    /// Number of presence updates to send
    #[arg(short, long, default_value_t = 10)]
    updates: u32,
}

#[tokio::main]
async fn main() -> Result {
    env_logger::init();
    // Load .env file if it exists (optional)
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let client_id = args
        .client_id
        .or_else(|| std::env::var("DISCORD_CLIENT_ID").ok())
        .unwrap_or_else(|| {
            eprintln!("Error: DISCORD_CLIENT_ID is required!");
            eprintln!("  - Command line: cargo run --example async_tokio_reconnect --features tokio-runtime -- --client-id YOUR_ID");
            eprintln!("  - Environment: DISCORD_CLIENT_ID=YOUR_ID cargo run --example async_tokio_reconnect --features tokio-runtime");
            std::process::exit(1);
        });

    let client = Arc::new(Mutex::new(new_discord_ipc_client(client_id)?));
    let retry = RetryConfig::with_max_attempts(5);

    println!("Connecting with automatic retry (5 attempts)...");
    with_retry_async(&retry, || {
        let client = client.clone();
        async move {
            let mut client = client.lock().await;
            match client.state() {
                SessionState::Disconnected => client.connect().await,
                _ => client.reconnect().await,
            }
        }
    })
    .await?;
    println!("Connected");

    for update in 1..=args.updates {
        let activity = ActivityBuilder::new()
            .state(format!("Update {} of {}", update, args.updates))
            .details("Testing async reconnection")
            .start_timestamp_now()?
            .build();

        let mut guard = client.lock().await;
        match guard.set_activity(&activity).await {
            Ok(_) => println!("Activity {} set", update),
            Err(e) if e.is_connection_error() => {
                println!("Connection error: {}, reconnecting", e);
                drop(guard);
                with_retry_async(&retry, || {
                    let client = client.clone();
                    async move { client.lock().await.reconnect().await }
                })
                .await?;
                client.lock().await.set_activity(&activity).await?;
                println!("Activity {} set after reconnecting", update);
            }
            Err(e) => return Err(e),
        }

        sleep(Duration::from_secs(5)).await;
    }

    let mut client = client.lock().await;
    client.clear_activity().await?;
    client.close().await;
    Ok(())
}
