use std::net::Ipv4Addr;

use crate::RuleEntry;

/// Whether a rule routing `source` through the given table already exists.
///
/// Matches on source address and table (by name or number) only, so a rule
/// left behind with a different priority still counts.
pub fn has_equivalent_rule(
    rules: &[RuleEntry],
    source: Ipv4Addr,
    table_name: &str,
    table_id: Option<u32>,
) -> bool {
    let host = source.to_string();
    let host_cidr = format!("{}/32", source);
    let table_id = table_id.map(|id| id.to_string());

    rules.iter().any(|rule| {
        let source_matches = rule
            .source
            .as_deref()
            .is_some_and(|src| src == host || src == host_cidr);
        let table_matches =
            rule.table == table_name || table_id.as_deref() == Some(rule.table.as_str());
        source_matches && table_matches
    })
}
