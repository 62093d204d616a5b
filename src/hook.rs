//! Interface-up hook that re-derives policy routing for one VLAN interface.
//!
//! The hook runs long after (and independently of) the run that installed
//! it, so it only looks at the interface's current address, the VLAN ID in
//! its name and the `rt_tables` registry. Its rule priority is
//! `100 + VLAN ID`, while the allocator hands out priorities from a per-run
//! counter starting at 100. After topology changes the two schemes can
//! disagree and leave two rules with different priorities for the same
//! source. Which numbering should win is unresolved; both are kept as-is.

use anyhow::{anyhow, Result};
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::classify::classify_links;
use crate::facts::{HostActions, SystemFacts};
use crate::pbr::{ensure_routes, ensure_rule, table_name, RtTables, FIRST_RULE_PRIORITY};
use crate::subnet::{network_cidr, synthesized_gateway};
use crate::{Interface, NetworkError, SourceRule};

pub const HOOK_SCRIPT_NAME: &str = "50-staticnet-vlan-pbr";
pub const HOOK_MODE: u32 = 0o755;

const SCRIPT_TEMPLATE: &str = r#"#!/bin/sh
# Generated by staticnet. Reapplies source-based routing for a VLAN interface.
# Invoked on interface-up with the interface in $IFACE (or as the first argument).
set -u

RT_TABLES="@RT_TABLES@"
IFACE="${IFACE:-${1:-}}"

case "$IFACE" in
    *.*) ;;
    *) exit 0 ;;
esac

VLAN_ID=$(printf '%s' "${IFACE##*.}" | sed 's/^0*//')
case "$VLAN_ID" in
    ''|*[!0-9]*) exit 0 ;;
esac

TABLE="vlan${VLAN_ID}"
grep -Eq "^[[:space:]]*[0-9]+[[:space:]]+${TABLE}([[:space:]]|\$)" "$RT_TABLES" 2>/dev/null || exit 0

CIDR=$(ip -4 -o addr show dev "$IFACE" scope global 2>/dev/null | awk '{ print $4; exit }')
[ -n "$CIDR" ] || exit 0
ADDR="${CIDR%/*}"
PREFIX="${CIDR#*/}"
# /31 and /32 have no room for a <network>.1 gateway
[ "$PREFIX" -lt 31 ] 2>/dev/null || exit 0

ip_to_int() {
    old_ifs=$IFS
    IFS=.
    set -- $1
    IFS=$old_ifs
    echo $(( ($1 << 24) + ($2 << 16) + ($3 << 8) + $4 ))
}

int_to_ip() {
    echo "$(( ($1 >> 24) & 255 )).$(( ($1 >> 16) & 255 )).$(( ($1 >> 8) & 255 )).$(( $1 & 255 ))"
}

MASK=$(( (4294967295 << (32 - PREFIX)) & 4294967295 ))
NET_INT=$(( $(ip_to_int "$ADDR") & MASK ))
NETWORK="$(int_to_ip "$NET_INT")/${PREFIX}"
GATEWAY=$(int_to_ip $(( NET_INT + 1 )))
[ "$GATEWAY" != "$ADDR" ] || exit 0
PRIORITY=$(( @BASE_PRIORITY@ + VLAN_ID ))

ip route replace "$NETWORK" dev "$IFACE" src "$ADDR" table "$TABLE"
ip route replace default via "$GATEWAY" dev "$IFACE" table "$TABLE"

ADDR_RE=$(printf '%s' "$ADDR" | sed 's/\./\\./g')
if ! ip rule show | grep -Eq "from ${ADDR_RE}(/32)? lookup ${TABLE}([[:space:]]|\$)"; then
    ip rule add from "$ADDR" table "$TABLE" priority "$PRIORITY"
fi

exit 0
"#;

pub fn reapply_priority(vlan_id: u16) -> u32 {
    FIRST_RULE_PRIORITY + u32::from(vlan_id)
}

pub fn hook_path(hook_dir: &Path) -> PathBuf {
    hook_dir.join(HOOK_SCRIPT_NAME)
}

pub fn render_hook_script(rt_tables_path: &Path) -> String {
    SCRIPT_TEMPLATE
        .replace("@RT_TABLES@", &rt_tables_path.display().to_string())
        .replace("@BASE_PRIORITY@", &FIRST_RULE_PRIORITY.to_string())
}

/// Write the hook script when it is missing or differs. Returns whether it was written.
pub fn install_hook_script<H: SystemFacts + HostActions + ?Sized>(
    host: &mut H,
    hook_dir: &Path,
    rt_tables_path: &Path,
) -> Result<bool> {
    let path = hook_path(hook_dir);
    let script = render_hook_script(rt_tables_path);
    if host.read_file(&path)?.as_deref() == Some(script.as_str()) {
        return Ok(false);
    }
    host.write_file(&path, &script, HOOK_MODE)?;
    info!(path = %path.display(), "installed interface hook");
    Ok(true)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReapplyPlan {
    pub interface: String,
    pub table_name: String,
    pub table_id: u32,
    pub priority: u32,
    pub source: Ipv4Addr,
    pub network: Ipv4Net,
    pub gateway: Ipv4Addr,
}

/// Routes and rule for a single VLAN interface, or `None` when the
/// interface is not a VLAN or its table is not registered.
pub fn plan_reapply(iface: &Interface, tables: &RtTables) -> Result<Option<ReapplyPlan>> {
    let Some(vlan_id) = iface.vlan_id() else {
        return Ok(None);
    };
    let name = table_name(iface);
    let Some(table_id) = tables.id_for(&name) else {
        return Ok(None);
    };

    let address = iface
        .address
        .ok_or_else(|| NetworkError::NoAddress(iface.name.clone()))?;
    let gateway =
        synthesized_gateway(&address).ok_or_else(|| NetworkError::NoGateway(iface.name.clone()))?;

    Ok(Some(ReapplyPlan {
        interface: iface.name.clone(),
        table_name: name,
        table_id,
        priority: reapply_priority(vlan_id),
        source: address.addr(),
        network: network_cidr(address.addr(), address.prefix_len())?,
        gateway,
    }))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReapplyOutcome {
    pub plan: ReapplyPlan,
    pub routes_installed: usize,
    pub rule_added: bool,
}

/// In-process equivalent of the hook script for the interface `name`
pub fn reapply<H: SystemFacts + HostActions + ?Sized>(
    host: &mut H,
    name: &str,
    rt_tables_path: &Path,
) -> Result<Option<ReapplyOutcome>> {
    let links = host.links()?;
    let iface = classify_links(&links)
        .into_iter()
        .find(|i| i.name == name)
        .ok_or_else(|| anyhow!("Interface {} not found", name))?;

    let tables = RtTables::parse(&host.read_file(rt_tables_path)?.unwrap_or_default());
    let Some(plan) = plan_reapply(&iface, &tables)? else {
        info!(iface = name, "no registered VLAN table, nothing to reapply");
        return Ok(None);
    };

    let routes_installed = ensure_routes(
        host,
        &plan.interface,
        plan.network,
        plan.source,
        plan.gateway,
        &plan.table_name,
    )?;

    let mut rules = host.rules()?;
    let rule = SourceRule {
        source: plan.source,
        table: plan.table_name.clone(),
        priority: plan.priority,
    };
    let rule_added = ensure_rule(host, &mut rules, &rule, &plan.table_name, Some(plan.table_id))?;

    Ok(Some(ReapplyOutcome {
        plan,
        routes_installed,
        rule_added,
    }))
}
