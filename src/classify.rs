use anyhow::Result;
use regex::{Regex, RegexBuilder};
use tracing::warn;

use crate::{Interface, InterfaceKind, Link, NetworkError};

const EXCLUDED_PREFIXES: [&str; 4] = ["docker", "veth", "br-", "virbr"];

/// Loopback, container bridges and virtual pairs are never candidates
pub fn is_excluded_name(name: &str) -> bool {
    name == "lo" || EXCLUDED_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Classify an interface by name: anything with a `.` is a VLAN subinterface
pub fn classify_name(name: &str) -> Result<InterfaceKind> {
    let Some((parent, id)) = name.rsplit_once('.') else {
        return Ok(InterfaceKind::Ethernet);
    };

    let invalid = || NetworkError::InvalidVlanId {
        iface: name.to_string(),
        id: id.to_string(),
    };

    if parent.is_empty() || id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid().into());
    }
    let id: u16 = id.parse().map_err(|_| invalid())?;
    if !(1..=4094).contains(&id) {
        return Err(invalid().into());
    }

    Ok(InterfaceKind::Vlan {
        parent: parent.to_string(),
        id,
    })
}

/// Turn raw links into interface records, dropping excluded and malformed names.
///
/// VLANs without a MAC of their own inherit the parent's.
pub fn classify_links(links: &[Link]) -> Vec<Interface> {
    let mut interfaces = Vec::with_capacity(links.len());

    for link in links {
        if is_excluded_name(&link.name) {
            continue;
        }
        let kind = match classify_name(&link.name) {
            Ok(kind) => kind,
            Err(e) => {
                warn!(iface = %link.name, "skipping interface: {:#}", e);
                continue;
            }
        };

        let mac = match (&kind, &link.mac) {
            (_, Some(mac)) => Some(mac.clone()),
            (InterfaceKind::Vlan { parent, .. }, None) => links
                .iter()
                .find(|l| &l.name == parent)
                .and_then(|l| l.mac.clone()),
            (InterfaceKind::Ethernet, None) => None,
        };

        interfaces.push(Interface {
            index: link.index,
            name: link.name.clone(),
            kind,
            address: link.addresses.first().copied(),
            mac,
        });
    }

    interfaces
}

/// Include/exclude name patterns, matched case-insensitively
#[derive(Debug, Clone)]
pub struct InterfaceFilter {
    include: Regex,
    exclude: Option<Regex>,
}

impl InterfaceFilter {
    pub fn new(include: &str, exclude: Option<&str>) -> Result<Self> {
        let include = compile(include)?;
        let exclude = match exclude {
            Some(pattern) if !pattern.is_empty() => Some(compile(pattern)?),
            _ => None,
        };
        Ok(Self { include, exclude })
    }

    pub fn matches(&self, name: &str) -> bool {
        if !self.include.is_match(name) {
            return false;
        }
        !self
            .exclude
            .as_ref()
            .is_some_and(|exclude| exclude.is_match(name))
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    let re = RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| NetworkError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
    Ok(re)
}
