//! Socket layer for Breeze live data.
//!
//! Breeze streams over three independent socket channels:
//!
//! | Channel        | Endpoint                          | Carries                               |
//! |----------------|-----------------------------------|---------------------------------------|
//! | `RateRefresh`  | `wss://livestream.icicidirect.com`| quote and depth ticks                 |
//! | `OhlcStream`   | `wss://breezeapi.icicidirect.com` | OHLC bars per interval room           |
//! | `OrderRefresh` | `wss://livefeeds.icicidirect.com` | order events and strategy streams     |
//!
//! ## Modules
//!
//! - [`decoder`]: positional tick arrays to named [`DecodedRecord`]s
//! - [`watch_set`]: per-connection record of joined tokens and rooms
//! - [`connection`]: [`ChannelConnection`] state machine, read loop and
//!   callback dispatch
//! - [`subscription`]: [`SubscriptionManager`] routing requests across the
//!   three channels
//!
//! ## Frames
//!
//! Control frames are JSON text: `{"user":..,"token":..}` right after the
//! handshake, then `join` / `leave` / `notify` frames. Inbound frames are
//! either a bare tick array or an `{"event":..,"data":..}` envelope.

pub mod connection;
pub mod decoder;
pub mod subscription;
pub mod watch_set;

pub use connection::{ChannelConnection, ConnectionState, StreamHandlers};
pub use decoder::{DecodedRecord, RecordKind};
pub use subscription::{
    FeedRequest, StreamResponse, SubscriptionManager, SubscriptionManagerBuilder,
};
pub use watch_set::WatchSet;
