use ipnet::Ipv4Net;
use std::net::{IpAddr, Ipv4Addr};

/// A link as reported by the OS, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub index: u32,
    pub name: String,
    pub mac: Option<String>,
    pub addresses: Vec<Ipv4Net>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterfaceKind {
    Ethernet,
    Vlan { parent: String, id: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub index: u32,
    pub name: String,
    pub kind: InterfaceKind,
    /// First IPv4 address with its prefix length
    pub address: Option<Ipv4Net>,
    pub mac: Option<String>,
}

impl Interface {
    pub fn vlan_id(&self) -> Option<u16> {
        match self.kind {
            InterfaceKind::Vlan { id, .. } => Some(id),
            InterfaceKind::Ethernet => None,
        }
    }

    pub fn parent(&self) -> Option<&str> {
        match &self.kind {
            InterfaceKind::Vlan { parent, .. } => Some(parent),
            InterfaceKind::Ethernet => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewaySource {
    Lease,
    Route,
    Synthesized,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeaseInfo {
    pub gateway: Option<Ipv4Addr>,
    pub gateway_source: Option<GatewaySource>,
    pub nameservers: Vec<IpAddr>,
    pub search: Vec<String>,
}

/// Resolver state for one link, before de-duplication and capping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolverInfo {
    pub nameservers: Vec<IpAddr>,
    pub search: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultRoute {
    pub gateway: Option<Ipv4Addr>,
    pub dev: String,
}

/// A policy rule as listed by `ip -json rule show`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleEntry {
    pub priority: u32,
    pub source: Option<String>,
    pub table: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableRoute {
    Subnet {
        network: Ipv4Net,
        dev: String,
        src: Ipv4Addr,
        table: String,
    },
    Default {
        gateway: Ipv4Addr,
        dev: String,
        table: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRule {
    pub source: Ipv4Addr,
    pub table: String,
    pub priority: u32,
}

/// An interface that will not be converted, with the reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub iface: String,
    pub reason: String,
}

impl Skipped {
    pub fn new(iface: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            iface: iface.into(),
            reason: reason.into(),
        }
    }
}
