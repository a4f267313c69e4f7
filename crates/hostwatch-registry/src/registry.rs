//! The host registry: live table of endpoints on the local segment.
//!
//! Every endpoint carries a liveness counter. A first sighting starts it at
//! `max_liveness`; each re-sighting bumps it back up (saturating) and each
//! missed sweep decrements it. When it reaches zero the endpoint is evicted.
//!
//! Lifecycle events are queued while the state lock is held and dispatched
//! to the callbacks after it is released, so a callback may call back into
//! the registry.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use hostwatch_alias::AliasStore;
use hostwatch_core::{
    Endpoint, EventKind, Freshness, Interface, MacAddr, RegistryConfig, RegistryEvent,
};

use crate::filter::{self, IgnoreReason};

/// Callback invoked with the endpoint that appeared or disappeared.
pub type EndpointCallback = Box<dyn Fn(&Endpoint) + Send + Sync>;

/// Outcome of a single observation.
#[derive(Debug, Clone, PartialEq)]
pub enum Sighting {
    /// First sighting; the endpoint was inserted and a new event queued.
    New(Endpoint),
    /// Re-sighting of a known endpoint.
    Known(Endpoint),
    /// Rejected by the ignore filter or an unparsable MAC.
    Ignored(IgnoreReason),
}

#[derive(Default)]
struct State {
    hosts: HashMap<MacAddr, Endpoint>,
    liveness: HashMap<MacAddr, u8>,
    by_ip: HashMap<IpAddr, Vec<MacAddr>>,
    pending: VecDeque<RegistryEvent>,
}

impl State {
    fn resight(&mut self, mac: &MacAddr, max_liveness: u8) -> Option<Endpoint> {
        let endpoint = self.hosts.get_mut(mac)?;
        endpoint.touch();

        let counter = self.liveness.get_mut(mac);
        debug_assert!(counter.is_some(), "endpoint {mac} has no liveness counter");
        if let Some(counter) = counter {
            if *counter < max_liveness {
                *counter += 1;
            }
        }
        Some(endpoint.clone())
    }

    fn insert(&mut self, endpoint: Endpoint, liveness: u8) {
        self.by_ip.entry(endpoint.ip).or_default().push(endpoint.mac);
        self.liveness.insert(endpoint.mac, liveness);
        self.hosts.insert(endpoint.mac, endpoint);
    }

    fn remove(&mut self, mac: &MacAddr) -> Option<Endpoint> {
        self.liveness.remove(mac);
        let endpoint = self.hosts.remove(mac)?;

        if let Entry::Occupied(mut slot) = self.by_ip.entry(endpoint.ip) {
            slot.get_mut().retain(|m| m != mac);
            if slot.get().is_empty() {
                slot.remove();
            }
        }
        Some(endpoint)
    }

    fn find_by_ip(&self, ip: &IpAddr) -> Option<&Endpoint> {
        self.by_ip
            .get(ip)?
            .first()
            .and_then(|mac| self.hosts.get(mac))
    }
}

/// Thread-safe registry of the endpoints currently present on the segment.
///
/// Share it with `Arc<HostRegistry>`; all operations take `&self`.
pub struct HostRegistry {
    interface: Interface,
    gateway: Endpoint,
    aliases: Arc<dyn AliasStore>,
    max_liveness: u8,
    state: Mutex<State>,
    dispatch: Mutex<()>,
    on_new: EndpointCallback,
    on_lost: EndpointCallback,
}

impl HostRegistry {
    /// Create a registry with the default liveness ceiling.
    pub fn new(
        interface: Interface,
        gateway: Endpoint,
        aliases: Arc<dyn AliasStore>,
        on_new: impl Fn(&Endpoint) + Send + Sync + 'static,
        on_lost: impl Fn(&Endpoint) + Send + Sync + 'static,
    ) -> Self {
        Self::with_config(
            &RegistryConfig::default(),
            interface,
            gateway,
            aliases,
            on_new,
            on_lost,
        )
    }

    /// Create a registry using `config.max_liveness`.
    ///
    /// Loads the alias overlay; a load failure is logged and leaves it empty.
    pub fn with_config(
        config: &RegistryConfig,
        interface: Interface,
        gateway: Endpoint,
        aliases: Arc<dyn AliasStore>,
        on_new: impl Fn(&Endpoint) + Send + Sync + 'static,
        on_lost: impl Fn(&Endpoint) + Send + Sync + 'static,
    ) -> Self {
        match aliases.load() {
            Ok(loaded) => tracing::debug!(count = loaded.len(), "Alias overlay loaded"),
            Err(e) => tracing::warn!(error = %e, "Failed to load aliases, continuing without"),
        }

        Self {
            interface,
            gateway,
            aliases,
            max_liveness: config.max_liveness.max(1),
            state: Mutex::new(State::default()),
            dispatch: Mutex::new(()),
            on_new: Box::new(on_new),
            on_lost: Box::new(on_lost),
        }
    }

    pub fn interface(&self) -> &Interface {
        &self.interface
    }

    pub fn gateway(&self) -> &Endpoint {
        &self.gateway
    }

    pub fn max_liveness(&self) -> u8 {
        self.max_liveness
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_own_or_gateway(&self, mac: &MacAddr) -> bool {
        *mac == self.interface.mac() || *mac == self.gateway.mac
    }

    // ── Discovery loop ────────────────────────────────────────────

    /// Record an `(ip, mac)` observation.
    ///
    /// Returns the existing endpoint on a re-sighting. A first sighting
    /// returns `None` and is reported through the new-endpoint callback;
    /// ignored observations also return `None`.
    pub fn observe(&self, ip: &str, mac: &str) -> Option<Endpoint> {
        match self.sight(ip, mac) {
            Sighting::Known(endpoint) => Some(endpoint),
            Sighting::New(_) | Sighting::Ignored(_) => None,
        }
    }

    /// Like [`observe`](Self::observe), but reports which path was taken.
    pub fn sight(&self, ip: &str, mac: &str) -> Sighting {
        let Ok(mac) = mac.parse::<MacAddr>() else {
            tracing::trace!(ip = %ip, mac = %mac, "Ignoring observation with invalid mac");
            return Sighting::Ignored(IgnoreReason::InvalidMac);
        };

        let addr = match filter::admit(&self.interface, &self.gateway, ip, &mac) {
            Ok(addr) => addr,
            Err(reason) => {
                tracing::trace!(ip = %ip, mac = %mac, reason = %reason, "Ignoring observation");
                return Sighting::Ignored(reason);
            }
        };

        let sighting = {
            let mut state = self.state();
            match state.resight(&mac, self.max_liveness) {
                Some(known) => Sighting::Known(known),
                None => {
                    let alias = self.aliases.get(&mac).unwrap_or_default();
                    let endpoint = Endpoint::with_alias(addr, mac, alias);
                    state.insert(endpoint.clone(), self.max_liveness);
                    state
                        .pending
                        .push_back(RegistryEvent::new_endpoint(endpoint.clone()));

                    tracing::debug!(mac = %mac, ip = %addr, "New endpoint");
                    Sighting::New(endpoint)
                }
            }
        };

        self.drain();
        sighting
    }

    /// Record that a sweep did not see `mac`.
    ///
    /// Decrements its liveness and evicts it on zero. Unknown addresses, the
    /// interface and the gateway are left alone.
    pub fn mark_missed(&self, mac: &str) {
        let Ok(mac) = mac.parse::<MacAddr>() else {
            return;
        };
        if self.is_own_or_gateway(&mac) {
            return;
        }

        {
            let mut state = self.state();
            let Some(counter) = state.liveness.get_mut(&mac) else {
                return;
            };
            *counter = counter.saturating_sub(1);
            if *counter > 0 {
                return;
            }

            if let Some(endpoint) = state.remove(&mac) {
                tracing::debug!(mac = %mac, ip = %endpoint.ip, "Endpoint lost");
                state.pending.push_back(RegistryEvent::lost_endpoint(endpoint));
            }
        }

        self.drain();
    }

    // ── Freshness ─────────────────────────────────────────────────

    /// Freshness of `mac`. The interface and gateway always report `Fresh`.
    pub fn freshness(&self, mac: &str) -> Freshness {
        let Ok(mac) = mac.parse::<MacAddr>() else {
            return Freshness::Unknown;
        };
        if self.is_own_or_gateway(&mac) {
            return Freshness::Fresh;
        }

        match self.state().liveness.get(&mac) {
            None => Freshness::Unknown,
            Some(&ttl) if ttl >= self.max_liveness => Freshness::Fresh,
            Some(_) => Freshness::Stale,
        }
    }

    /// Whether `mac` was not freshly confirmed: unknown, evicted, or below
    /// full liveness. Never true for the interface or gateway.
    pub fn was_missed(&self, mac: &str) -> bool {
        !self.freshness(mac).is_fresh()
    }

    /// The raw liveness counter for `mac`, if it is in the table.
    pub fn liveness(&self, mac: &str) -> Option<u8> {
        let mac = mac.parse::<MacAddr>().ok()?;
        self.state().liveness.get(&mac).copied()
    }

    // ── Aliases ───────────────────────────────────────────────────

    /// Name a known endpoint and persist the name to the alias overlay.
    ///
    /// Returns `false` without touching the overlay when `mac` is unknown.
    pub fn set_alias(&self, mac: &str, name: &str) -> bool {
        let Ok(mac) = mac.parse::<MacAddr>() else {
            return false;
        };

        let mut state = self.state();
        let Some(endpoint) = state.hosts.get_mut(&mac) else {
            return false;
        };

        if let Err(e) = self.aliases.set(&mac, name) {
            tracing::warn!(mac = %mac, error = %e, "Failed to persist alias");
        }
        endpoint.alias = name.to_string();
        true
    }

    // ── Queries ───────────────────────────────────────────────────

    pub fn get(&self, mac: &str) -> Option<Endpoint> {
        let mac = mac.parse::<MacAddr>().ok()?;
        self.state().hosts.get(&mac).cloned()
    }

    /// The endpoint holding `ip`. If several do, the earliest sighting wins.
    pub fn get_by_ip(&self, ip: IpAddr) -> Option<Endpoint> {
        self.state().find_by_ip(&ip).cloned()
    }

    pub fn has(&self, ip: IpAddr) -> bool {
        self.state().by_ip.contains_key(&ip)
    }

    /// Point-in-time copy of every endpoint, in no particular order.
    pub fn list(&self) -> Vec<Endpoint> {
        self.state().hosts.values().cloned().collect()
    }

    /// Hardware addresses currently in the table.
    pub fn macs(&self) -> Vec<MacAddr> {
        self.state().hosts.keys().copied().collect()
    }

    /// Visit every endpoint while holding the state lock.
    ///
    /// The visitor must not call back into this registry; it would deadlock.
    pub fn for_each(&self, mut visitor: impl FnMut(&MacAddr, &Endpoint)) {
        let state = self.state();
        for (mac, endpoint) in &state.hosts {
            visitor(mac, endpoint);
        }
    }

    pub fn len(&self) -> usize {
        self.state().hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().hosts.is_empty()
    }

    // ── Event dispatch ────────────────────────────────────────────

    /// Deliver queued events in order, outside the state lock.
    ///
    /// Only one thread dispatches at a time. A thread that finds dispatch
    /// busy leaves its events for the active dispatcher, which re-checks the
    /// queue after releasing the dispatch guard.
    fn drain(&self) {
        loop {
            let guard = match self.dispatch.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => return,
            };

            // One at a time: a panicking callback leaves the rest queued.
            loop {
                let next = self.state().pending.pop_front();
                let Some(event) = next else {
                    break;
                };
                match event.kind {
                    EventKind::New => (self.on_new)(&event.endpoint),
                    EventKind::Lost => (self.on_lost)(&event.endpoint),
                }
            }

            drop(guard);
            if self.state().pending.is_empty() {
                return;
            }
        }
    }
}
