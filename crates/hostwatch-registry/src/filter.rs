//! Ignore policy for raw `(ip, mac)` observations.
//!
//! Keeps the local interface and the gateway (by IP or by MAC), broadcast traffic and anything
//! outside the interface subnet (multicast noise) out of the host table.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

use hostwatch_core::{Endpoint, Interface, MacAddr};

/// Why an observation was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    OwnAddress,
    Gateway,
    BroadcastIp,
    BroadcastMac,
    InvalidIp,
    InvalidMac,
    OutsideSubnet,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::OwnAddress => "own address",
            Self::Gateway => "gateway",
            Self::BroadcastIp => "broadcast ip",
            Self::BroadcastMac => "broadcast mac",
            Self::InvalidIp => "invalid ip",
            Self::InvalidMac => "invalid mac",
            Self::OutsideSubnet => "outside subnet",
        };
        f.write_str(s)
    }
}

/// Decide whether an observation may enter the registry.
///
/// Returns the parsed address when it is admitted.
pub fn admit(
    interface: &Interface,
    gateway: &Endpoint,
    ip: &str,
    mac: &MacAddr,
) -> Result<IpAddr, IgnoreReason> {
    let Ok(addr) = ip.trim().parse::<IpAddr>() else {
        return Err(IgnoreReason::InvalidIp);
    };

    if addr == interface.ip() || *mac == interface.mac() {
        return Err(IgnoreReason::OwnAddress);
    }
    if addr == gateway.ip || *mac == gateway.mac {
        return Err(IgnoreReason::Gateway);
    }
    if interface.is_broadcast(addr) || addr == IpAddr::V4(Ipv4Addr::BROADCAST) {
        return Err(IgnoreReason::BroadcastIp);
    }
    if mac.is_broadcast() {
        return Err(IgnoreReason::BroadcastMac);
    }
    if !interface.contains(addr) {
        return Err(IgnoreReason::OutsideSubnet);
    }

    Ok(addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Interface, Endpoint) {
        let iface = Interface::new(
            "192.168.1.10/24".parse().unwrap(),
            "00:00:00:00:00:01".parse().unwrap(),
        );
        let gateway = Endpoint::new(
            "192.168.1.1".parse().unwrap(),
            "00:00:00:00:00:fe".parse().unwrap(),
        );
        (iface, gateway)
    }

    fn host_mac() -> MacAddr {
        "00:11:22:33:44:55".parse().unwrap()
    }

    #[test]
    fn test_admits_subnet_host() {
        let (iface, gw) = setup();
        let addr = admit(&iface, &gw, "192.168.1.20", &host_mac()).unwrap();
        assert_eq!(addr, "192.168.1.20".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_rejections() {
        let (iface, gw) = setup();
        let cases = [
            ("192.168.1.10", host_mac(), IgnoreReason::OwnAddress),
            ("192.168.1.1", host_mac(), IgnoreReason::Gateway),
            ("192.168.1.50", iface.mac(), IgnoreReason::OwnAddress),
            ("192.168.1.51", gw.mac, IgnoreReason::Gateway),
            ("192.168.1.255", host_mac(), IgnoreReason::BroadcastIp),
            ("255.255.255.255", host_mac(), IgnoreReason::BroadcastIp),
            ("192.168.1.20", MacAddr::BROADCAST, IgnoreReason::BroadcastMac),
            ("224.0.0.251", host_mac(), IgnoreReason::OutsideSubnet),
            ("10.0.0.4", host_mac(), IgnoreReason::OutsideSubnet),
            ("fe80::1", host_mac(), IgnoreReason::OutsideSubnet),
            ("192.168.1", host_mac(), IgnoreReason::InvalidIp),
            ("", host_mac(), IgnoreReason::InvalidIp),
        ];

        for (ip, mac, expected) in cases {
            assert_eq!(admit(&iface, &gw, ip, &mac), Err(expected), "ip {ip:?}");
        }
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(IgnoreReason::OutsideSubnet.to_string(), "outside subnet");
    }
}
