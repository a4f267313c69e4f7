//! hostwatch-alias: human-readable names for hardware addresses.
//!
//! The overlay is independent of liveness: a name registered for a MAC
//! survives the endpoint being evicted and is applied again the next time
//! the address shows up.

pub mod store;

pub use store::{AliasError, AliasStore, FileAliasStore, MemoryAliasStore};
