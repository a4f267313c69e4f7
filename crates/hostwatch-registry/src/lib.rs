//! hostwatch-registry: Live registry of endpoints on the local network segment.
//!
//! Tracks which devices are present using a decay-based liveness counter,
//! filters out self, gateway, broadcast and off-subnet noise, overlays
//! human-readable aliases, and drives the table from periodic sweeps.

pub mod error;
pub mod filter;
pub mod registry;
pub mod replay;
pub mod scheduler;

pub use registry::{EndpointCallback, HostRegistry, Sighting};
pub use scheduler::{apply_sweep, Observation, ObservationSource, SweepScheduler, SweepSummary};
