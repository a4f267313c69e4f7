//! Sweep scheduling engine.
//!
//! Pulls one sweep of observations per tick from an [`ObservationSource`],
//! feeds them to the registry, and marks every known endpoint the sweep did
//! not confirm as missed. The tick interval sets how many seconds of silence
//! it takes to evict an endpoint (`max_liveness` × interval).

use std::collections::{HashSet, VecDeque};
use std::ops::AddAssign;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::time::{interval, Duration, MissedTickBehavior};

use hostwatch_core::{MacAddr, RegistryConfig};

use crate::error::Result;
use crate::registry::{HostRegistry, Sighting};

/// A raw observation produced by a discovery probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub ip: String,
    pub mac: String,
}

impl Observation {
    pub fn new(ip: impl Into<String>, mac: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            mac: mac.into(),
        }
    }
}

/// Per-sweep outcome counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    pub observed: u32,
    pub new: u32,
    pub known: u32,
    pub ignored: u32,
    pub missed: u32,
}

impl AddAssign for SweepSummary {
    fn add_assign(&mut self, rhs: Self) {
        self.observed += rhs.observed;
        self.new += rhs.new;
        self.known += rhs.known;
        self.ignored += rhs.ignored;
        self.missed += rhs.missed;
    }
}

/// Something that yields one sweep worth of observations at a time.
#[allow(async_fn_in_trait)]
pub trait ObservationSource {
    /// The next sweep, or `None` when the source is exhausted.
    async fn next_sweep(&mut self) -> Result<Option<Vec<Observation>>>;
}

impl ObservationSource for VecDeque<Vec<Observation>> {
    async fn next_sweep(&mut self) -> Result<Option<Vec<Observation>>> {
        Ok(self.pop_front())
    }
}

/// Apply one sweep: observe everything, then mark the rest missed.
pub fn apply_sweep(registry: &HostRegistry, observations: &[Observation]) -> SweepSummary {
    let mut summary = SweepSummary::default();
    let mut confirmed: HashSet<MacAddr> = HashSet::new();

    for obs in observations {
        summary.observed += 1;
        match registry.sight(&obs.ip, &obs.mac) {
            Sighting::New(endpoint) => {
                summary.new += 1;
                confirmed.insert(endpoint.mac);
            }
            Sighting::Known(endpoint) => {
                summary.known += 1;
                confirmed.insert(endpoint.mac);
            }
            Sighting::Ignored(_) => summary.ignored += 1,
        }
    }

    for mac in registry.macs() {
        if !confirmed.contains(&mac) {
            registry.mark_missed(&mac.to_string());
            summary.missed += 1;
        }
    }

    summary
}

/// Drives the registry from a source at a fixed interval.
pub struct SweepScheduler<S> {
    registry: Arc<HostRegistry>,
    source: S,
    interval: Duration,
}

impl<S: ObservationSource> SweepScheduler<S> {
    pub fn new(registry: Arc<HostRegistry>, source: S, config: &RegistryConfig) -> Self {
        Self {
            registry,
            source,
            interval: Duration::from_millis(config.sweep_interval_ms.max(1)),
        }
    }

    /// Run until the source is exhausted and return the accumulated counts.
    ///
    /// A source error is logged and the sweep skipped.
    pub async fn run(mut self) -> SweepSummary {
        let mut totals = SweepSummary::default();
        let mut sweeps: u64 = 0;
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let observations = match self.source.next_sweep().await {
                Ok(Some(observations)) => observations,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, "Sweep failed, skipping");
                    continue;
                }
            };

            sweeps += 1;
            let summary = apply_sweep(&self.registry, &observations);
            tracing::info!(
                sweep = sweeps,
                observed = summary.observed,
                new = summary.new,
                known = summary.known,
                ignored = summary.ignored,
                missed = summary.missed,
                hosts = self.registry.len(),
                "Sweep complete"
            );
            totals += summary;
        }

        tracing::info!(sweeps, hosts = self.registry.len(), "Sweep source exhausted");
        totals
    }
}
