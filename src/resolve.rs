use std::net::IpAddr;
use tracing::{debug, warn};

use crate::facts::SystemFacts;
use crate::subnet::synthesized_gateway;
use crate::{GatewaySource, Interface, LeaseInfo};

/// Upper bound on nameservers and on search domains per interface
pub const MAX_DNS_ENTRIES: usize = 3;

/// Resolve gateway and DNS metadata for one interface.
///
/// Gateway sources, in order: DHCP lease record, the interface's default
/// route, then (when `gateway_fallback` is set) the first host of the
/// interface's network. Lookup failures are logged and treated as misses.
pub fn resolve_lease<F: SystemFacts + ?Sized>(
    facts: &F,
    iface: &Interface,
    gateway_fallback: bool,
) -> LeaseInfo {
    let mut info = LeaseInfo::default();

    let lease = facts.lease_gateway(iface).unwrap_or_else(|e| {
        warn!(iface = %iface.name, "lease lookup failed: {:#}", e);
        None
    });
    if let Some(gateway) = lease {
        info.gateway = Some(gateway);
        info.gateway_source = Some(GatewaySource::Lease);
    } else {
        let route = facts.default_route(Some(&iface.name)).unwrap_or_else(|e| {
            warn!(iface = %iface.name, "default route lookup failed: {:#}", e);
            None
        });
        if let Some(gateway) = route.and_then(|r| r.gateway) {
            info.gateway = Some(gateway);
            info.gateway_source = Some(GatewaySource::Route);
        } else if gateway_fallback {
            if let Some(gateway) = iface.address.as_ref().and_then(synthesized_gateway) {
                debug!(iface = %iface.name, %gateway, "no lease or route, assuming gateway");
                info.gateway = Some(gateway);
                info.gateway_source = Some(GatewaySource::Synthesized);
            }
        }
    }

    match facts.resolver(&iface.name) {
        Ok(resolver) => {
            info.nameservers = cap_unique(
                resolver
                    .nameservers
                    .into_iter()
                    .filter(|addr| !is_stub_resolver(addr)),
            );
            info.search = cap_unique(resolver.search.into_iter().filter(|d| !d.is_empty()));
        }
        Err(e) => debug!(iface = %iface.name, "no resolver data: {:#}", e),
    }

    info
}

fn is_stub_resolver(addr: &IpAddr) -> bool {
    addr.is_loopback() || addr.is_unspecified()
}

fn cap_unique<T: PartialEq>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(MAX_DNS_ENTRIES);
    for item in items {
        if out.len() == MAX_DNS_ENTRIES {
            break;
        }
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}
