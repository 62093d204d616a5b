//! Narrow seams between the generator and the host.
//!
//! [`SystemFacts`] answers questions about live network state and
//! [`HostActions`] performs every mutation. The rest of the crate is
//! written against these traits so it can run against an in-memory host.

use anyhow::Result;
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

use crate::{DefaultRoute, Interface, Link, ResolverInfo, RuleEntry, SourceRule, TableRoute};

mod linux;
pub(crate) mod parse;

pub use linux::LinuxHost;

pub trait SystemFacts {
    /// All links with their IPv4 addresses, in OS enumeration order
    fn links(&self) -> Result<Vec<Link>>;

    /// The IPv4 default route, optionally restricted to one device
    fn default_route(&self, dev: Option<&str>) -> Result<Option<DefaultRoute>>;

    /// Gateway recorded by the DHCP client for this interface, if any
    fn lease_gateway(&self, iface: &Interface) -> Result<Option<Ipv4Addr>>;

    fn resolver(&self, iface: &str) -> Result<ResolverInfo>;

    fn rules(&self) -> Result<Vec<RuleEntry>>;

    /// Routes currently in one policy routing table
    fn table_routes(&self, table: &str) -> Result<Vec<TableRoute>>;

    /// File contents, or `None` when the file does not exist
    fn read_file(&self, path: &Path) -> Result<Option<String>>;
}

pub trait HostActions {
    /// Replace a file's contents atomically and set its permission bits
    fn write_file(&mut self, path: &Path, contents: &str, mode: u32) -> Result<()>;

    fn append_line(&mut self, path: &Path, line: &str) -> Result<()>;

    fn apply_network_config(&mut self) -> Result<()>;

    fn replace_route(&mut self, route: &TableRoute) -> Result<()>;

    fn add_rule(&mut self, rule: &SourceRule) -> Result<()>;

    fn sleep(&mut self, duration: Duration);
}
