//! hostwatch-core: Shared types, events, configuration, and errors for hostwatch.
//!
//! This crate provides the foundational types used by every hostwatch component:
//! - `MacAddr` and `Endpoint`, the record for one device on the segment
//! - `Interface`, the local endpoint plus the subnet it sits on
//! - Lifecycle events emitted when endpoints appear and disappear
//! - Registry configuration
//! - Common error types

pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use crate::config::RegistryConfig;
pub use crate::error::HostwatchError;
pub use crate::events::{EventKind, RegistryEvent};
pub use crate::types::{Endpoint, Freshness, Interface, MacAddr};
