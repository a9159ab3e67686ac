//! # breeze-rs
//!
//! Streaming core for the ICICI Breeze market-data and order-event sockets.
//!
//! The crate resolves instruments to wire tokens through a daily security
//! master, keeps three socket channels (quotes/depth, OHLC bars, order
//! events) connected and subscribed, and decodes positional tick arrays into
//! named records enriched with instrument metadata.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use breeze_rs::{BreezeClient, SubscriptionManager, TokenRegistry};
//! use breeze_rs::types::{Exchange, InstrumentKey};
//! use breeze_rs::ws::{FeedRequest, StreamHandlers, SubscriptionManagerBuilder};
//!
//! #[tokio::main]
//! async fn main() -> breeze_rs::Result<()> {
//!     let client = BreezeClient::new("your-app-key")?;
//!     let credentials = client.generate_session("your-session-token").await?;
//!
//!     let registry = Arc::new(TokenRegistry::new());
//!     client.download_security_master(&registry).await?;
//!
//!     let manager: SubscriptionManager = SubscriptionManagerBuilder::new(credentials, registry)
//!         .handlers(StreamHandlers::new().on_ticks(|tick| println!("{:?}", tick.fields)))
//!         .build();
//!
//!     manager.ws_connect().await?;
//!     let request = FeedRequest::instrument(InstrumentKey::cash(Exchange::Nse, "RELIND"));
//!     manager.subscribe_feeds(&request).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod constants;
pub mod error;
pub mod instruments;
pub mod types;
pub mod ws;

/// Re-export the REST client at crate root for convenience.
pub use client::BreezeClient;
/// Re-export the error type and Result alias.
pub use error::{BreezeError, Result};
pub use instruments::TokenRegistry;
pub use ws::SubscriptionManager;
