use anyhow::Result;
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::NetworkError;

const PRIVATE_RANGES: [(u32, u8); 3] = [
    (0x0A00_0000, 8),  // 10.0.0.0/8
    (0xAC10_0000, 12), // 172.16.0.0/12
    (0xC0A8_0000, 16), // 192.168.0.0/16
];

/// Netmask for a prefix length as an integer (e.g. 24 -> 0xFFFFFF00)
pub fn prefix_mask(prefix: u8) -> u32 {
    match prefix {
        0 => 0,
        p if p >= 32 => u32::MAX,
        p => u32::MAX << (32 - u32::from(p)),
    }
}

/// Check whether an address falls in one of the RFC1918 private ranges
pub fn is_rfc1918(addr: Ipv4Addr) -> bool {
    let value = u32::from(addr);
    PRIVATE_RANGES
        .iter()
        .any(|(network, prefix)| value & prefix_mask(*prefix) == *network)
}

/// Compute the network CIDR containing `addr/prefix`
pub fn network_cidr(addr: Ipv4Addr, prefix: u8) -> Result<Ipv4Net> {
    let network = Ipv4Addr::from(u32::from(addr) & prefix_mask(prefix));
    let net = Ipv4Net::new(network, prefix)
        .map_err(|_| NetworkError::InvalidCidr(format!("{}/{}", addr, prefix)))?;
    Ok(net)
}

/// Parse `a.b.c.d/len`, keeping the host part of the address
pub fn parse_interface_address(cidr: &str) -> Result<Ipv4Net> {
    let net =
        Ipv4Net::from_str(cidr).map_err(|_| NetworkError::InvalidCidr(cidr.to_string()))?;
    Ok(net)
}

/// The gateway assumed when nothing better is known: the first host of the network
pub fn synthesized_gateway(address: &Ipv4Net) -> Option<Ipv4Addr> {
    if address.prefix_len() >= 31 {
        return None;
    }
    let network = u32::from(address.network());
    let gateway = Ipv4Addr::from(network + 1);
    // Never point an interface at itself.
    if gateway == address.addr() {
        return None;
    }
    Some(gateway)
}
