use anyhow::Result;

use crate::config::Config;
use crate::generate::detect_base;
use crate::subnet::is_rfc1918;
use crate::{plan, GatewaySource, LinuxHost};

pub(crate) fn run_scan(config: Config) -> Result<()> {
    let host = LinuxHost::new();
    let plan = plan(&host, &config)?;

    println!("Interfaces found: {}", plan.interfaces.len());
    for iface in &plan.interfaces {
        let kind = match (iface.vlan_id(), iface.parent()) {
            (Some(id), Some(parent)) => format!("vlan {} on {}", id, parent),
            _ => "ethernet".to_string(),
        };
        let address = iface
            .address
            .map(|a| {
                let scope = if is_rfc1918(a.addr()) { "private" } else { "public" };
                format!("{} ({})", a, scope)
            })
            .unwrap_or_else(|| "-".to_string());
        println!("  {:<16} {:<20} {}", iface.name, kind, address);
    }

    println!("Interfaces to convert: {}", plan.entries.len());
    for (iface, lease) in &plan.entries {
        let gateway = match (lease.gateway, lease.gateway_source) {
            (Some(gw), Some(GatewaySource::Lease)) => format!("{} (lease)", gw),
            (Some(gw), Some(GatewaySource::Route)) => format!("{} (route)", gw),
            (Some(gw), _) => format!("{} (assumed)", gw),
            (None, _) => "none".to_string(),
        };
        println!("  {}: gateway {}", iface.name, gateway);
        if !lease.nameservers.is_empty() {
            let servers: Vec<String> = lease.nameservers.iter().map(|a| a.to_string()).collect();
            println!("    nameservers: {}", servers.join(", "));
        }
        if !lease.search.is_empty() {
            println!("    search: {}", lease.search.join(", "));
        }
    }

    if !plan.skipped.is_empty() {
        println!("Interfaces skipped: {}", plan.skipped.len());
        for skipped in &plan.skipped {
            println!("  {}: {}", skipped.iface, skipped.reason);
        }
    }

    if !config.vlan_ids.is_empty() {
        match detect_base(&host, &config) {
            Ok(base) => {
                let missing: Vec<String> = config
                    .vlan_ids
                    .iter()
                    .map(|id| format!("{}.{}", base, id))
                    .filter(|name| !plan.interfaces.iter().any(|i| &i.name == name))
                    .collect();
                println!("Base interface: {}", base);
                if !missing.is_empty() {
                    println!("VLANs that would be created: {}", missing.join(", "));
                }
            }
            Err(e) => println!("Base interface: unknown ({:#})", e),
        }
    }

    Ok(())
}
