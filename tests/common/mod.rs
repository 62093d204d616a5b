#![allow(dead_code)]

use anyhow::Result;
use staticnet::{
    DefaultRoute, HostActions, Interface, Link, NetworkError, ResolverInfo, RuleEntry, SourceRule,
    SystemFacts, TableRoute,
};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const STOCK_RT_TABLES: &str = "#\n\
                                   # reserved values\n\
                                   #\n\
                                   255\tlocal\n\
                                   254\tmain\n\
                                   253\tdefault\n\
                                   0\tunspec\n";

/// In-memory host: facts are set up by the test, actions are recorded.
#[derive(Debug, Default)]
pub struct FakeHost {
    pub links: Vec<Link>,
    /// Replaces `links` on the first successful apply, to model new VLANs
    pub links_after_apply: Option<Vec<Link>>,
    pub default_routes: Vec<DefaultRoute>,
    pub lease_gateways: HashMap<String, Ipv4Addr>,
    pub resolvers: HashMap<String, ResolverInfo>,
    pub rule_list: Vec<RuleEntry>,
    pub files: HashMap<PathBuf, (String, u32)>,
    pub routes: Vec<TableRoute>,
    pub route_replacements: usize,
    pub added_rules: Vec<SourceRule>,
    pub writes: usize,
    pub apply_count: usize,
    pub fail_apply: bool,
    pub slept: Duration,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &Path, contents: &str) -> Self {
        self.files
            .insert(path.to_path_buf(), (contents.to_string(), 0o644));
        self
    }

    pub fn file(&self, path: &Path) -> Option<&str> {
        self.files.get(path).map(|(contents, _)| contents.as_str())
    }

    pub fn mode(&self, path: &Path) -> Option<u32> {
        self.files.get(path).map(|(_, mode)| *mode)
    }
}

pub fn link(index: u32, name: &str, mac: Option<&str>, addr: Option<&str>) -> Link {
    Link {
        index,
        name: name.to_string(),
        mac: mac.map(str::to_string),
        addresses: addr.map(|a| vec![a.parse().unwrap()]).unwrap_or_default(),
    }
}

pub fn default_route(gateway: &str, dev: &str) -> DefaultRoute {
    DefaultRoute {
        gateway: Some(gateway.parse().unwrap()),
        dev: dev.to_string(),
    }
}

impl SystemFacts for FakeHost {
    fn links(&self) -> Result<Vec<Link>> {
        Ok(self.links.clone())
    }

    fn default_route(&self, dev: Option<&str>) -> Result<Option<DefaultRoute>> {
        Ok(self
            .default_routes
            .iter()
            .find(|r| dev.map_or(true, |d| r.dev == d))
            .cloned())
    }

    fn lease_gateway(&self, iface: &Interface) -> Result<Option<Ipv4Addr>> {
        Ok(self.lease_gateways.get(&iface.name).copied())
    }

    fn resolver(&self, iface: &str) -> Result<ResolverInfo> {
        Ok(self.resolvers.get(iface).cloned().unwrap_or_default())
    }

    fn rules(&self) -> Result<Vec<RuleEntry>> {
        Ok(self.rule_list.clone())
    }

    fn table_routes(&self, table: &str) -> Result<Vec<TableRoute>> {
        Ok(self
            .routes
            .iter()
            .filter(|r| route_table(r) == table)
            .cloned()
            .collect())
    }

    fn read_file(&self, path: &Path) -> Result<Option<String>> {
        Ok(self.file(path).map(str::to_string))
    }
}

impl HostActions for FakeHost {
    fn write_file(&mut self, path: &Path, contents: &str, mode: u32) -> Result<()> {
        self.writes += 1;
        self.files
            .insert(path.to_path_buf(), (contents.to_string(), mode));
        Ok(())
    }

    fn append_line(&mut self, path: &Path, line: &str) -> Result<()> {
        let entry = self
            .files
            .entry(path.to_path_buf())
            .or_insert_with(|| (String::new(), 0o644));
        if !entry.0.is_empty() && !entry.0.ends_with('\n') {
            entry.0.push('\n');
        }
        entry.0.push_str(line);
        entry.0.push('\n');
        Ok(())
    }

    fn apply_network_config(&mut self) -> Result<()> {
        if self.fail_apply {
            return Err(NetworkError::ApplyFailed("netplan exited with status 1".into()).into());
        }
        self.apply_count += 1;
        if let Some(links) = self.links_after_apply.take() {
            self.links = links;
        }
        Ok(())
    }

    fn replace_route(&mut self, route: &TableRoute) -> Result<()> {
        self.route_replacements += 1;
        self.routes.retain(|existing| !same_route_key(existing, route));
        self.routes.push(route.clone());
        Ok(())
    }

    fn add_rule(&mut self, rule: &SourceRule) -> Result<()> {
        self.added_rules.push(rule.clone());
        self.rule_list.push(RuleEntry {
            priority: rule.priority,
            source: Some(rule.source.to_string()),
            table: rule.table.clone(),
        });
        Ok(())
    }

    fn sleep(&mut self, duration: Duration) {
        self.slept += duration;
    }
}

fn route_table(route: &TableRoute) -> &str {
    match route {
        TableRoute::Subnet { table, .. } | TableRoute::Default { table, .. } => table,
    }
}

fn same_route_key(a: &TableRoute, b: &TableRoute) -> bool {
    match (a, b) {
        (
            TableRoute::Subnet {
                network: n1,
                table: t1,
                ..
            },
            TableRoute::Subnet {
                network: n2,
                table: t2,
                ..
            },
        ) => n1 == n2 && t1 == t2,
        (TableRoute::Default { table: t1, .. }, TableRoute::Default { table: t2, .. }) => t1 == t2,
        _ => false,
    }
}
