//! Security master and instrument identity.
//!
//! - [`registry`]: [`TokenRegistry`], six exchange partitions of
//!   symbol ↔ token maps, reloaded atomically from the daily CSV.
//! - [`codec`]: composite contract strings, expiry normalisation, stream
//!   symbol resolution and subscription channel ids.

pub mod codec;
pub mod registry;

pub use registry::{ResolvedToken, TokenEntry, TokenRegistry};
