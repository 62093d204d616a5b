//! The end-to-end run: VLAN provisioning, static conversion, policy routing
//! and the interface hook.

use anyhow::Result;
use std::path::Path;
use tracing::{debug, info};

use crate::classify::classify_links;
use crate::config::Config;
use crate::document::{assemble, NetworkDocument};
use crate::facts::{HostActions, SystemFacts};
use crate::hook::install_hook_script;
use crate::pbr::{allocate, apply_plan, PbrOutcome};
use crate::resolve::resolve_lease;
use crate::subnet::is_rfc1918;
use crate::{Interface, LeaseInfo, Skipped};

mod vlans;

pub use vlans::{detect_base, ensure_vlans};

/// netplan warns about configuration readable by other users
pub const DOCUMENT_MODE: u32 = 0o600;

#[derive(Debug, Clone)]
pub struct Plan {
    /// Every classified interface, in enumeration order
    pub interfaces: Vec<Interface>,
    /// Interfaces selected for static addressing with their lease data
    pub entries: Vec<(Interface, LeaseInfo)>,
    pub skipped: Vec<Skipped>,
    pub document: NetworkDocument,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub vlans_created: Vec<String>,
    pub converted: Vec<String>,
    pub skipped: Vec<Skipped>,
    pub document_changed: bool,
    pub pbr: Option<PbrOutcome>,
    pub hook_installed: bool,
}

impl RunReport {
    /// Interface-level failures; any of these makes the run unsuccessful
    pub fn failures(&self) -> &[Skipped] {
        self.pbr.as_ref().map(|p| p.failed.as_slice()).unwrap_or(&[])
    }
}

/// Read host state and build the document without changing anything
pub fn plan<F: SystemFacts + ?Sized>(facts: &F, config: &Config) -> Result<Plan> {
    let filter = config.filter()?;
    let interfaces = classify_links(&facts.links()?);

    let mut entries = Vec::new();
    let mut skipped = Vec::new();

    for iface in &interfaces {
        if !filter.matches(&iface.name) {
            debug!(iface = %iface.name, "excluded by pattern");
            skipped.push(Skipped::new(&iface.name, "excluded by pattern"));
            continue;
        }
        let Some(address) = iface.address else {
            skipped.push(Skipped::new(&iface.name, "no IPv4 address"));
            continue;
        };
        if !is_rfc1918(address.addr()) {
            skipped.push(Skipped::new(&iface.name, "public address, left on DHCP"));
            continue;
        }

        let lease = resolve_lease(facts, iface, config.gateway_fallback);
        debug!(
            iface = %iface.name,
            address = %address,
            gateway = ?lease.gateway,
            source = ?lease.gateway_source,
            nameservers = lease.nameservers.len(),
            "resolved lease"
        );
        entries.push((iface.clone(), lease));
    }

    let document = assemble(&entries, &interfaces);
    Ok(Plan {
        interfaces,
        entries,
        skipped,
        document,
    })
}

/// Write `rendered` to `path` unless the persisted copy is identical.
///
/// Returns whether the file was written.
pub fn write_document<H: SystemFacts + HostActions + ?Sized>(
    host: &mut H,
    path: &Path,
    rendered: &str,
) -> Result<bool> {
    if host.read_file(path)?.as_deref() == Some(rendered) {
        return Ok(false);
    }
    host.write_file(path, rendered, DOCUMENT_MODE)?;
    Ok(true)
}

pub fn run<H: SystemFacts + HostActions + ?Sized>(host: &mut H, config: &Config) -> Result<RunReport> {
    config.validate()?;

    let vlans_created = ensure_vlans(host, config)?;
    let plan = plan(&*host, config)?;

    let mut report = RunReport {
        vlans_created,
        converted: plan.entries.iter().map(|(i, _)| i.name.clone()).collect(),
        skipped: plan.skipped.clone(),
        ..Default::default()
    };

    if plan.document.is_empty() {
        info!("no private interfaces to convert");
    } else {
        let rendered = plan.document.render();
        report.document_changed = write_document(host, &config.document_path, &rendered)?;
        if report.document_changed {
            info!(path = %config.document_path.display(), "network configuration changed, applying");
            host.apply_network_config()?;
        } else {
            info!("network configuration unchanged");
        }
    }

    if config.pbr {
        let pbr_plan = allocate(&plan.entries);
        report.pbr = Some(apply_plan(host, &pbr_plan, &config.rt_tables_path)?);
        report.hook_installed =
            install_hook_script(host, &config.hook_dir, &config.rt_tables_path)?;
    }

    Ok(report)
}
