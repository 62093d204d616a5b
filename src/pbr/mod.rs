//! Policy-based routing: one routing table and one source rule per interface.

use anyhow::Result;
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;
use std::path::Path;
use tracing::{info, warn};

use crate::facts::{HostActions, SystemFacts};
use crate::subnet::network_cidr;
use crate::{
    Interface, InterfaceKind, LeaseInfo, NetworkError, RuleEntry, Skipped, SourceRule, TableRoute,
};

mod rt_tables;
mod rules;

pub use rt_tables::RtTables;
pub use rules::has_equivalent_rule;

pub const FIRST_TABLE_ID: u32 = 100;
pub const FIRST_RULE_PRIORITY: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PbrAssignment {
    pub interface: String,
    pub table_id: u32,
    pub table_name: String,
    pub priority: u32,
    pub source: Ipv4Addr,
    pub network: Ipv4Net,
    pub gateway: Ipv4Addr,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PbrPlan {
    pub assignments: Vec<PbrAssignment>,
    pub skipped: Vec<Skipped>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PbrOutcome {
    pub tables_registered: Vec<String>,
    pub routes_installed: usize,
    pub rules_added: usize,
    pub rules_present: usize,
    pub failed: Vec<Skipped>,
}

/// `vlan<ID>` for VLAN subinterfaces, the interface name otherwise
pub fn table_name(iface: &Interface) -> String {
    match &iface.kind {
        InterfaceKind::Vlan { id, .. } => format!("vlan{}", id),
        InterfaceKind::Ethernet => iface.name.clone(),
    }
}

/// Assign tables and priorities in discovery order.
///
/// Table IDs and priorities start at 100 and advance together for each
/// interface that receives an assignment. Interfaces without an address or
/// gateway are reported as skipped and do not consume a number.
pub fn allocate(entries: &[(Interface, LeaseInfo)]) -> PbrPlan {
    let mut plan = PbrPlan::default();
    let mut table_id = FIRST_TABLE_ID;
    let mut priority = FIRST_RULE_PRIORITY;

    for (iface, lease) in entries {
        let assignment = (|| -> Result<PbrAssignment> {
            let address = iface
                .address
                .ok_or_else(|| NetworkError::NoAddress(iface.name.clone()))?;
            let gateway = lease
                .gateway
                .ok_or_else(|| NetworkError::NoGateway(iface.name.clone()))?;
            Ok(PbrAssignment {
                interface: iface.name.clone(),
                table_id,
                table_name: table_name(iface),
                priority,
                source: address.addr(),
                network: network_cidr(address.addr(), address.prefix_len())?,
                gateway,
            })
        })();

        match assignment {
            Ok(assignment) => {
                plan.assignments.push(assignment);
                table_id += 1;
                priority += 1;
            }
            Err(e) => {
                warn!(iface = %iface.name, "skipping policy routing: {:#}", e);
                plan.skipped.push(Skipped::new(&iface.name, format!("{:#}", e)));
            }
        }
    }

    plan
}

/// Install the subnet route and the default route for one table.
///
/// Routes already present in the table are left alone. Returns how many
/// routes were replaced.
pub fn ensure_routes<H: SystemFacts + HostActions + ?Sized>(
    host: &mut H,
    dev: &str,
    network: Ipv4Net,
    source: Ipv4Addr,
    gateway: Ipv4Addr,
    table: &str,
) -> Result<usize> {
    let wanted = [
        TableRoute::Subnet {
            network,
            dev: dev.to_string(),
            src: source,
            table: table.to_string(),
        },
        TableRoute::Default {
            gateway,
            dev: dev.to_string(),
            table: table.to_string(),
        },
    ];
    let present = host.table_routes(table)?;

    let mut replaced = 0;
    for route in wanted.iter().filter(|r| !present.contains(r)) {
        host.replace_route(route)?;
        replaced += 1;
    }
    Ok(replaced)
}

/// Add `rule` unless an equivalent one (same source and table) exists.
///
/// `existing` is updated with the new rule. Returns whether a rule was added.
pub fn ensure_rule<H: HostActions + ?Sized>(
    host: &mut H,
    existing: &mut Vec<RuleEntry>,
    rule: &SourceRule,
    table_name: &str,
    table_id: Option<u32>,
) -> Result<bool> {
    if has_equivalent_rule(existing, rule.source, table_name, table_id) {
        return Ok(false);
    }
    host.add_rule(rule)?;
    existing.push(RuleEntry {
        priority: rule.priority,
        source: Some(rule.source.to_string()),
        table: rule.table.clone(),
    });
    Ok(true)
}

/// Register tables, install routes and add rules for every assignment.
///
/// Errors reading the registry or the rule list abort; anything that goes
/// wrong for a single interface is recorded in `failed` and processing
/// continues with the next one.
pub fn apply_plan<H: SystemFacts + HostActions + ?Sized>(
    host: &mut H,
    plan: &PbrPlan,
    rt_tables_path: &Path,
) -> Result<PbrOutcome> {
    let mut outcome = PbrOutcome {
        failed: plan.skipped.clone(),
        ..Default::default()
    };
    if plan.assignments.is_empty() {
        return Ok(outcome);
    }

    let mut tables = RtTables::parse(&host.read_file(rt_tables_path)?.unwrap_or_default());
    let mut rules = host.rules()?;

    for assignment in &plan.assignments {
        if let Err(e) = apply_assignment(
            host,
            assignment,
            &mut tables,
            &mut rules,
            rt_tables_path,
            &mut outcome,
        ) {
            warn!(iface = %assignment.interface, "policy routing failed: {:#}", e);
            outcome
                .failed
                .push(Skipped::new(&assignment.interface, format!("{:#}", e)));
        }
    }

    Ok(outcome)
}

fn apply_assignment<H: SystemFacts + HostActions + ?Sized>(
    host: &mut H,
    assignment: &PbrAssignment,
    tables: &mut RtTables,
    rules: &mut Vec<RuleEntry>,
    rt_tables_path: &Path,
    outcome: &mut PbrOutcome,
) -> Result<()> {
    let id = assignment.table_id;
    match tables.register(id, &assignment.table_name) {
        Some(line) => {
            host.append_line(rt_tables_path, &line)?;
            info!(iface = %assignment.interface, table = %line, "registered routing table");
            outcome.tables_registered.push(line);
        }
        None => {
            if let Some(existing) = tables.name_for(id) {
                if existing != assignment.table_name {
                    warn!(
                        iface = %assignment.interface,
                        "table {} is already registered as '{}', reusing the number",
                        id,
                        existing
                    );
                }
            }
        }
    }
    // `ip rule show` prints whatever name the registry holds for the number
    let shown_name = tables
        .name_for(id)
        .unwrap_or(&assignment.table_name)
        .to_string();

    let table = id.to_string();
    outcome.routes_installed += ensure_routes(
        host,
        &assignment.interface,
        assignment.network,
        assignment.source,
        assignment.gateway,
        &table,
    )?;

    let rule = SourceRule {
        source: assignment.source,
        table,
        priority: assignment.priority,
    };
    if ensure_rule(host, rules, &rule, &shown_name, Some(id))? {
        info!(
            iface = %assignment.interface,
            source = %assignment.source,
            table = id,
            priority = assignment.priority,
            "added source rule"
        );
        outcome.rules_added += 1;
    } else {
        outcome.rules_present += 1;
    }

    Ok(())
}
