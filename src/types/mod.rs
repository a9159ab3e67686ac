//! Shared types for the Breeze streaming client.
//!
//! ## Organization
//!
//! - [`enums`]: Exchanges, product types, option rights, channel kinds, intervals
//! - [`instrument`]: Instrument keys, recovered metadata, stream symbols, credentials
//!
//! All enums are re-exported at the module root via `pub use enums::*`.

pub mod enums;
pub mod instrument;

pub use enums::*;
pub use instrument::*;
