use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::net::Ipv4Addr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::debug;

use super::parse::{
    parse_default_routes_json, parse_dhclient_leases, parse_ip_addr_json, parse_nameserver_tokens,
    parse_networkd_lease, parse_resolv_conf, parse_resolvectl_values, parse_rules_json,
    parse_search_tokens, parse_table_routes_json,
};
use super::{HostActions, SystemFacts};
use crate::{
    DefaultRoute, Interface, Link, NetworkError, ResolverInfo, RuleEntry, SourceRule, TableRoute,
};

const NETWORKD_LEASE_DIR: &str = "/run/systemd/netif/leases";
const DHCLIENT_LEASE_DIRS: [&str; 2] = ["/var/lib/dhcp", "/var/lib/dhclient"];
const RESOLV_CONF: &str = "/etc/resolv.conf";

/// The real host: `ip`, `resolvectl` and `netplan` plus the filesystem
#[derive(Debug, Default)]
pub struct LinuxHost;

impl LinuxHost {
    pub fn new() -> Self {
        Self
    }
}

fn run(program: &str, args: &[&str]) -> Result<String> {
    let command = format!("{} {}", program, args.join(" "));
    debug!(%command, "running");

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| NetworkError::CommandFailed {
            command: command.clone(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(NetworkError::CommandFailed {
            command,
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
        .into());
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

fn dhclient_lease_paths(iface: &str) -> Vec<PathBuf> {
    DHCLIENT_LEASE_DIRS
        .iter()
        .flat_map(|dir| {
            [
                Path::new(dir).join(format!("dhclient.{}.leases", iface)),
                Path::new(dir).join(format!("dhclient-{}.leases", iface)),
            ]
        })
        .collect()
}

impl SystemFacts for LinuxHost {
    fn links(&self) -> Result<Vec<Link>> {
        let out = run("ip", &["-json", "addr", "show"])?;
        parse_ip_addr_json(&out)
    }

    fn default_route(&self, dev: Option<&str>) -> Result<Option<DefaultRoute>> {
        let mut args = vec!["-json", "-4", "route", "show", "default"];
        if let Some(dev) = dev {
            args.extend(["dev", dev]);
        }
        let out = run("ip", &args)?;
        let mut routes = parse_default_routes_json(&out)?;
        // `ip` omits `dev` from the JSON when filtering on it
        if let Some(dev) = dev {
            for route in &mut routes {
                route.dev = dev.to_string();
            }
        }
        Ok(routes.into_iter().next())
    }

    fn lease_gateway(&self, iface: &Interface) -> Result<Option<Ipv4Addr>> {
        let networkd = Path::new(NETWORKD_LEASE_DIR).join(iface.index.to_string());
        if let Some(contents) = read_optional(&networkd)? {
            if let Some(gateway) = parse_networkd_lease(&contents) {
                return Ok(Some(gateway));
            }
        }

        for path in dhclient_lease_paths(&iface.name) {
            if let Some(contents) = read_optional(&path)? {
                if let Some(gateway) = parse_dhclient_leases(&contents) {
                    return Ok(Some(gateway));
                }
            }
        }

        Ok(None)
    }

    fn resolver(&self, iface: &str) -> Result<ResolverInfo> {
        match (run("resolvectl", &["dns", iface]), run("resolvectl", &["domain", iface])) {
            (Ok(dns), Ok(domains)) => Ok(ResolverInfo {
                nameservers: parse_nameserver_tokens(&parse_resolvectl_values(&dns)),
                search: parse_search_tokens(&parse_resolvectl_values(&domains)),
            }),
            (Err(e), _) | (_, Err(e)) => {
                debug!(iface, "resolvectl unavailable, reading {}: {:#}", RESOLV_CONF, e);
                Ok(read_optional(Path::new(RESOLV_CONF))?
                    .map(|contents| parse_resolv_conf(&contents))
                    .unwrap_or_default())
            }
        }
    }

    fn rules(&self) -> Result<Vec<RuleEntry>> {
        let out = run("ip", &["-json", "rule", "show"])?;
        parse_rules_json(&out)
    }

    fn table_routes(&self, table: &str) -> Result<Vec<TableRoute>> {
        let out = run("ip", &["-json", "-4", "route", "show", "table", table])?;
        parse_table_routes_json(&out, table)
    }

    fn read_file(&self, path: &Path) -> Result<Option<String>> {
        read_optional(path)
    }
}

impl HostActions for LinuxHost {
    fn write_file(&mut self, path: &Path, contents: &str, mode: u32) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let tmp_path = path.with_extension(format!("tmp.{}", std::process::id()));
        let result = (|| -> Result<()> {
            let mut tmp_file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&tmp_path)
                .with_context(|| {
                    format!("Failed to create temporary file: {}", tmp_path.display())
                })?;
            tmp_file.write_all(contents.as_bytes())?;
            tmp_file.sync_all().with_context(|| {
                format!("Failed to sync temporary file: {}", tmp_path.display())
            })?;
            fs::set_permissions(&tmp_path, fs::Permissions::from_mode(mode))?;
            fs::rename(&tmp_path, path)
                .with_context(|| format!("Failed to replace file: {}", path.display()))?;
            Ok(())
        })();

        if result.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        result
    }

    fn append_line(&mut self, path: &Path, line: &str) -> Result<()> {
        let existing = read_optional(path)?.unwrap_or_default();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open {} for append", path.display()))?;
        if !existing.is_empty() && !existing.ends_with('\n') {
            writeln!(file)?;
        }
        writeln!(file, "{}", line)
            .with_context(|| format!("Failed to append to {}", path.display()))?;
        Ok(())
    }

    fn apply_network_config(&mut self) -> Result<()> {
        run("netplan", &["apply"]).map_err(|e| NetworkError::ApplyFailed(format!("{:#}", e)))?;
        Ok(())
    }

    fn replace_route(&mut self, route: &TableRoute) -> Result<()> {
        match route {
            TableRoute::Subnet {
                network,
                dev,
                src,
                table,
            } => {
                let (network, src) = (network.to_string(), src.to_string());
                run(
                    "ip",
                    &[
                        "route", "replace", &network, "dev", dev, "src", &src, "table", table,
                    ],
                )?;
            }
            TableRoute::Default {
                gateway,
                dev,
                table,
            } => {
                let gateway = gateway.to_string();
                run(
                    "ip",
                    &[
                        "route", "replace", "default", "via", &gateway, "dev", dev, "table",
                        table,
                    ],
                )?;
            }
        }
        Ok(())
    }

    fn add_rule(&mut self, rule: &SourceRule) -> Result<()> {
        let (source, priority) = (rule.source.to_string(), rule.priority.to_string());
        run(
            "ip",
            &[
                "rule", "add", "from", &source, "table", &rule.table, "priority", &priority,
            ],
        )?;
        Ok(())
    }

    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
