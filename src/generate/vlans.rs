use anyhow::{anyhow, Result};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{BaseInterface, Config, DhcpWait};
use crate::document::bootstrap_document;
use crate::facts::{HostActions, SystemFacts};
use crate::NetworkError;

use super::{plan, DOCUMENT_MODE};

/// The configured base interface, or the device of the IPv4 default route
pub fn detect_base<F: SystemFacts + ?Sized>(facts: &F, config: &Config) -> Result<String> {
    match &config.base_interface {
        BaseInterface::Named(name) => Ok(name.clone()),
        BaseInterface::Auto => {
            let route = facts.default_route(None)?;
            let base = route
                .map(|r| r.dev)
                .ok_or(NetworkError::BaseInterfaceNotFound)?;
            debug!(%base, "detected base interface from default route");
            Ok(base)
        }
    }
}

/// Create missing `<base>.<id>` subinterfaces on DHCP and wait for their leases.
///
/// Returns the names of the VLANs that had to be created.
pub fn ensure_vlans<H: SystemFacts + HostActions + ?Sized>(
    host: &mut H,
    config: &Config,
) -> Result<Vec<String>> {
    if config.vlan_ids.is_empty() {
        return Ok(Vec::new());
    }

    let base = detect_base(&*host, config)?;
    let links = host.links()?;
    let base_link = links
        .iter()
        .find(|l| l.name == base)
        .ok_or_else(|| anyhow!("Base interface {} not found", base))?;

    let missing_ids: Vec<u16> = config
        .vlan_ids
        .iter()
        .copied()
        .filter(|id| {
            let name = format!("{}.{}", base, id);
            !links.iter().any(|l| l.name == name)
        })
        .collect();
    let missing: Vec<String> = missing_ids
        .iter()
        .map(|id| format!("{}.{}", base, id))
        .collect();

    if missing.is_empty() {
        debug!(%base, "all requested VLANs already exist");
        return Ok(missing);
    }

    info!(%base, vlans = %missing.join(", "), "creating VLAN subinterfaces");
    // Interfaces already converted keep their static configuration
    let current = plan(&*host, config)?.document;
    let doc = bootstrap_document(current, &base, base_link.mac.clone(), &missing_ids);
    host.write_file(&config.document_path, &doc.render(), DOCUMENT_MODE)?;
    host.apply_network_config()?;

    wait_for_leases(host, &missing, &config.dhcp_wait)?;
    Ok(missing)
}

/// Poll until every named interface has an IPv4 address or the wait runs out.
///
/// Running out is logged and is not an error.
fn wait_for_leases<H: SystemFacts + HostActions + ?Sized>(
    host: &mut H,
    names: &[String],
    wait: &DhcpWait,
) -> Result<()> {
    let mut waited = Duration::ZERO;
    loop {
        let links = host.links()?;
        let pending: Vec<&str> = names
            .iter()
            .filter(|name| {
                !links
                    .iter()
                    .any(|l| &l.name == *name && !l.addresses.is_empty())
            })
            .map(String::as_str)
            .collect();

        if pending.is_empty() {
            info!("DHCP leases acquired for new VLANs");
            return Ok(());
        }
        if waited >= wait.timeout {
            warn!(
                pending = %pending.join(", "),
                "timed out after {}s waiting for DHCP leases, continuing",
                wait.timeout.as_secs()
            );
            return Ok(());
        }

        host.sleep(wait.interval);
        waited += wait.interval;
    }
}
