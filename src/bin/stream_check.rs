//! Binary to open a Breeze session, load the security master and stream
//! RELIND quotes and depth for a short while.
//!
//! # Usage
//!
//! ```sh
//! export BREEZE_API_KEY="your-app-key"
//! export BREEZE_SESSION_TOKEN="your-api-session"
//! cargo run --bin stream_check --features cli
//! ```

use std::env;
use std::sync::Arc;
use std::time::Duration;

use breeze_rs::types::{Exchange, InstrumentKey};
use breeze_rs::ws::{FeedRequest, StreamHandlers, SubscriptionManagerBuilder};
use breeze_rs::{BreezeClient, BreezeError, TokenRegistry};
use tokio::time;

fn require(name: &str) -> breeze_rs::Result<String> {
    env::var(name).map_err(|_| BreezeError::Session(format!("set {name} env var before running")))
}

#[tokio::main]
async fn main() -> breeze_rs::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let api_key = require("BREEZE_API_KEY")?;
    let session_token = require("BREEZE_SESSION_TOKEN")?;

    let client = BreezeClient::new(api_key)?;
    println!("Generating session…");
    let credentials = client.generate_session(&session_token).await?;

    let registry = Arc::new(TokenRegistry::new());
    println!("Downloading security master…");
    let loaded = client.download_security_master(&registry).await?;
    println!("Loaded {loaded} instruments");

    let manager = SubscriptionManagerBuilder::new(credentials, registry)
        .handlers(
            StreamHandlers::new()
                .on_ticks(|tick| println!("{:#?}", tick.fields))
                .on_error(|e| eprintln!("Error: {e}")),
        )
        .build();

    manager.ws_connect().await?;

    let request =
        FeedRequest::instrument(InstrumentKey::cash(Exchange::Nse, "RELIND")).depth(true);
    let response = manager.subscribe_feeds(&request).await?;
    println!("{}", response.message);

    println!("Listening for events for 10 seconds…");
    println!("(Note: data only arrives during market hours 9:15–15:30 IST)\n");
    time::sleep(Duration::from_secs(10)).await;

    for response in manager.ws_disconnect().await? {
        println!("{}", response.message);
    }
    println!("Done.");

    Ok(())
}
