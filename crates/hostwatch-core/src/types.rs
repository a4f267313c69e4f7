//! Core domain types for the hostwatch endpoint registry.
//!
//! These types describe devices seen on the local network segment and are
//! shared by the alias overlay, the registry, and the sweep driver.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::error::HostwatchError;

// ── Hardware address ──────────────────────────────────────────────

/// A normalized 48-bit hardware address.
///
/// Parses any case with `:`, `-`, `.` or no separators, and always
/// displays as lower-case colon separated octets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// `ff:ff:ff:ff:ff:ff`
    pub const BROADCAST: MacAddr = MacAddr([0xff; 6]);

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for MacAddr {
    type Err = HostwatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || HostwatchError::InvalidMac(s.to_string());

        let groups: Vec<&str> = if s.contains([':', '-']) {
            s.split([':', '-']).collect()
        } else if s.contains('.') {
            s.split('.').collect()
        } else {
            vec![s]
        };

        let mut digits = String::with_capacity(12);
        match groups.len() {
            // aa:bb:cc:dd:ee:ff, with single-digit groups zero padded
            6 => {
                for group in &groups {
                    match group.len() {
                        1 => {
                            digits.push('0');
                            digits.push_str(group);
                        }
                        2 => digits.push_str(group),
                        _ => return Err(invalid()),
                    }
                }
            }
            // aabb.ccdd.eeff
            3 if groups.iter().all(|g| g.len() == 4) => groups.iter().for_each(|g| digits.push_str(g)),
            1 if s.len() == 12 => digits.push_str(s),
            _ => return Err(invalid()),
        }

        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let mut octets = [0u8; 6];
        for (i, octet) in octets.iter_mut().enumerate() {
            *octet = u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
        }
        Ok(Self(octets))
    }
}

impl TryFrom<String> for MacAddr {
    type Error = HostwatchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MacAddr> for String {
    fn from(mac: MacAddr) -> Self {
        mac.to_string()
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

// ── Endpoint ──────────────────────────────────────────────────────

/// One network-attached device, keyed by its hardware address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub mac: MacAddr,
    pub ip: IpAddr,
    /// Human-readable name from the alias overlay; empty when none is set.
    #[serde(default)]
    pub alias: String,
    pub hostname: Option<String>,
    pub vendor: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Free-form attributes attached by other subsystems.
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
}

impl Endpoint {
    pub fn new(ip: IpAddr, mac: MacAddr) -> Self {
        Self::with_alias(ip, mac, String::new())
    }

    /// Build an endpoint carrying a name from the alias overlay.
    pub fn with_alias(ip: IpAddr, mac: MacAddr, alias: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            mac,
            ip,
            alias: alias.into(),
            hostname: None,
            vendor: None,
            first_seen: now,
            last_seen: now,
            meta: BTreeMap::new(),
        }
    }

    /// Alias if one is set, then hostname, then the IP address.
    pub fn display_name(&self) -> String {
        if !self.alias.is_empty() {
            return self.alias.clone();
        }
        match &self.hostname {
            Some(h) if !h.is_empty() => h.clone(),
            _ => self.ip.to_string(),
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Utc::now();
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.alias.is_empty() {
            write!(f, "{} ({})", self.ip, self.mac)
        } else {
            write!(f, "{} ({}, {})", self.ip, self.mac, self.alias)
        }
    }
}

// ── Interface ─────────────────────────────────────────────────────

/// The local interface: its own endpoint plus the subnet it is attached to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interface {
    pub endpoint: Endpoint,
    pub network: IpNet,
}

impl Interface {
    /// `network` carries the interface address and prefix, e.g. `192.168.1.10/24`.
    pub fn new(network: IpNet, mac: MacAddr) -> Self {
        Self {
            endpoint: Endpoint::new(network.addr(), mac),
            network,
        }
    }

    pub fn ip(&self) -> IpAddr {
        self.endpoint.ip
    }

    pub fn mac(&self) -> MacAddr {
        self.endpoint.mac
    }

    /// Whether `ip` is the directed broadcast address of this subnet.
    pub fn is_broadcast(&self, ip: IpAddr) -> bool {
        ip == self.network.broadcast()
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        self.network.contains(&ip)
    }
}

// ── Freshness ─────────────────────────────────────────────────────

/// How recently an address was confirmed by a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    /// Never seen, or already evicted.
    Unknown,
    /// Known, but missed at least one sweep since it was last confirmed.
    Stale,
    /// Liveness is saturated.
    Fresh,
}

impl Freshness {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh)
    }
}
