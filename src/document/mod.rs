//! The declarative network document (netplan v2 layout).

use ipnet::Ipv4Net;
use std::net::{IpAddr, Ipv4Addr};

use crate::{Interface, InterfaceKind, LeaseInfo};

mod render;

pub use render::HEADER;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nameservers {
    pub addresses: Vec<IpAddr>,
    pub search: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceConfig {
    pub dhcp4: bool,
    pub macaddress: Option<String>,
    pub address: Option<Ipv4Net>,
    pub gateway: Option<Ipv4Addr>,
    pub nameservers: Option<Nameservers>,
}

impl InterfaceConfig {
    pub fn dhcp(macaddress: Option<String>) -> Self {
        Self {
            dhcp4: true,
            macaddress,
            address: None,
            gateway: None,
            nameservers: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VlanConfig {
    pub id: u16,
    pub link: String,
    pub config: InterfaceConfig,
}

/// Ethernets and VLANs, each kept in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkDocument {
    pub ethernets: Vec<(String, InterfaceConfig)>,
    pub vlans: Vec<(String, VlanConfig)>,
}

impl NetworkDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ethernets.is_empty() && self.vlans.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ethernets.iter().any(|(n, _)| n == name) || self.vlans.iter().any(|(n, _)| n == name)
    }

    /// Insert or replace an ethernet entry, keeping its original position
    pub fn set_ethernet(&mut self, name: &str, config: InterfaceConfig) {
        match self.ethernets.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = config,
            None => self.ethernets.push((name.to_string(), config)),
        }
    }

    /// Insert or replace a VLAN entry, keeping its original position
    pub fn set_vlan(&mut self, name: &str, vlan: VlanConfig) {
        match self.vlans.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = vlan,
            None => self.vlans.push((name.to_string(), vlan)),
        }
    }

    pub fn ethernet(&self, name: &str) -> Option<&InterfaceConfig> {
        self.ethernets
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
    }

    pub fn vlan(&self, name: &str) -> Option<&VlanConfig> {
        self.vlans.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// Static configuration fragment for one interface
pub fn static_fragment(iface: &Interface, lease: &LeaseInfo) -> InterfaceConfig {
    let nameservers = if lease.nameservers.is_empty() && lease.search.is_empty() {
        None
    } else {
        Some(Nameservers {
            addresses: lease.nameservers.clone(),
            search: lease.search.clone(),
        })
    };

    InterfaceConfig {
        dhcp4: false,
        macaddress: iface.mac.clone(),
        address: iface.address,
        gateway: lease.gateway,
        nameservers,
    }
}

/// Merge per-interface fragments into one document.
///
/// `entries` are the interfaces converted to static addressing, in discovery
/// order. `all` is the full classified interface list; parents of VLANs that
/// are not themselves converted are kept on DHCP so every `link` resolves.
pub fn assemble(entries: &[(Interface, LeaseInfo)], all: &[Interface]) -> NetworkDocument {
    let mut doc = NetworkDocument::new();

    for (iface, lease) in entries {
        let fragment = static_fragment(iface, lease);
        match &iface.kind {
            InterfaceKind::Ethernet => doc.set_ethernet(&iface.name, fragment),
            InterfaceKind::Vlan { parent, id } => {
                ensure_parent(&mut doc, parent, entries, all);
                doc.set_vlan(
                    &iface.name,
                    VlanConfig {
                        id: *id,
                        link: parent.clone(),
                        config: fragment,
                    },
                );
            }
        }
    }

    doc
}

fn ensure_parent(
    doc: &mut NetworkDocument,
    parent: &str,
    entries: &[(Interface, LeaseInfo)],
    all: &[Interface],
) {
    if doc.contains(parent) || entries.iter().any(|(i, _)| i.name == parent) {
        return;
    }
    let mac = all
        .iter()
        .find(|i| i.name == parent)
        .and_then(|i| i.mac.clone());
    doc.set_ethernet(parent, InterfaceConfig::dhcp(mac));
}

/// Add `base` and the `<base>.<id>` VLANs on DHCP to `doc`.
///
/// Entries already in `doc` are kept as they are, so interfaces that are
/// converted stay static while the new VLANs come up.
pub fn bootstrap_document(
    mut doc: NetworkDocument,
    base: &str,
    base_mac: Option<String>,
    vlan_ids: &[u16],
) -> NetworkDocument {
    if doc.ethernet(base).is_none() {
        doc.set_ethernet(base, InterfaceConfig::dhcp(base_mac));
    }
    for id in vlan_ids {
        let name = format!("{}.{}", base, id);
        if doc.vlan(&name).is_none() {
            doc.set_vlan(
                &name,
                VlanConfig {
                    id: *id,
                    link: base.to_string(),
                    config: InterfaceConfig::dhcp(None),
                },
            );
        }
    }
    doc
}
