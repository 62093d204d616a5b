//! Parsers for command output and lease/resolver files.
//!
//! Kept free of I/O so every format can be tested against captured samples.

use anyhow::Result;
use ipnet::Ipv4Net;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};

use crate::{DefaultRoute, Link, NetworkError, ResolverInfo, RuleEntry, TableRoute};

#[derive(Deserialize)]
struct IpLinkJson {
    ifindex: Option<u32>,
    ifname: Option<String>,
    address: Option<String>,
    #[serde(default)]
    addr_info: Vec<IpAddrInfoJson>,
}

#[derive(Deserialize)]
struct IpAddrInfoJson {
    family: Option<String>,
    local: Option<String>,
    prefixlen: Option<u8>,
}

#[derive(Deserialize)]
struct IpRouteJson {
    dst: Option<String>,
    gateway: Option<String>,
    dev: Option<String>,
    prefsrc: Option<String>,
}

#[derive(Deserialize)]
struct IpRuleJson {
    priority: Option<u32>,
    src: Option<String>,
    srclen: Option<u8>,
    table: Option<String>,
}

fn malformed(command: &str, err: serde_json::Error) -> NetworkError {
    NetworkError::MalformedOutput {
        command: command.to_string(),
        reason: err.to_string(),
    }
}

/// Parse `ip -json addr show` into links carrying their IPv4 addresses
pub fn parse_ip_addr_json(json: &str) -> Result<Vec<Link>> {
    let entries: Vec<IpLinkJson> =
        serde_json::from_str(json).map_err(|e| malformed("ip -json addr show", e))?;

    let mut links = Vec::with_capacity(entries.len());
    for entry in entries {
        let (Some(index), Some(name)) = (entry.ifindex, entry.ifname) else {
            continue;
        };

        let mac = entry
            .address
            .filter(|mac| !mac.is_empty() && mac != "00:00:00:00:00:00");

        let addresses = entry
            .addr_info
            .iter()
            .filter(|info| info.family.as_deref() == Some("inet"))
            .filter_map(|info| {
                let local: Ipv4Addr = info.local.as_deref()?.parse().ok()?;
                Ipv4Net::new(local, info.prefixlen?).ok()
            })
            .collect();

        links.push(Link {
            index,
            name,
            mac,
            addresses,
        });
    }

    Ok(links)
}

/// Parse `ip -json -4 route show default`
pub fn parse_default_routes_json(json: &str) -> Result<Vec<DefaultRoute>> {
    let entries: Vec<IpRouteJson> =
        serde_json::from_str(json).map_err(|e| malformed("ip -json -4 route show default", e))?;

    Ok(entries
        .into_iter()
        .filter(|route| matches!(route.dst.as_deref(), None | Some("default")))
        .filter_map(|route| {
            Some(DefaultRoute {
                gateway: route.gateway.as_deref().and_then(|g| g.parse().ok()),
                dev: route.dev?,
            })
        })
        .collect())
}

/// Parse `ip -json -4 route show table <table>`.
///
/// Only the shapes this crate installs are returned: a default route via a
/// gateway, and a subnet route with a preferred source.
pub fn parse_table_routes_json(json: &str, table: &str) -> Result<Vec<TableRoute>> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    let entries: Vec<IpRouteJson> =
        serde_json::from_str(json).map_err(|e| malformed("ip -json -4 route show table", e))?;

    Ok(entries
        .into_iter()
        .filter_map(|route| {
            let dev = route.dev?;
            match route.dst.as_deref()? {
                "default" => Some(TableRoute::Default {
                    gateway: route.gateway?.parse().ok()?,
                    dev,
                    table: table.to_string(),
                }),
                dst => Some(TableRoute::Subnet {
                    network: parse_route_dst(dst)?,
                    dev,
                    src: route.prefsrc?.parse().ok()?,
                    table: table.to_string(),
                }),
            }
        })
        .collect())
}

// `ip` prints host routes without a prefix length
fn parse_route_dst(dst: &str) -> Option<Ipv4Net> {
    dst.parse().ok().or_else(|| {
        dst.parse::<Ipv4Addr>()
            .ok()
            .and_then(|addr| Ipv4Net::new(addr, 32).ok())
    })
}

/// Parse `ip -json rule show`
pub fn parse_rules_json(json: &str) -> Result<Vec<RuleEntry>> {
    let entries: Vec<IpRuleJson> =
        serde_json::from_str(json).map_err(|e| malformed("ip -json rule show", e))?;

    Ok(entries
        .into_iter()
        .map(|rule| {
            let source = rule.src.filter(|src| src != "all").map(|src| match rule.srclen {
                Some(len) if len != 32 => format!("{}/{}", src, len),
                _ => src,
            });
            RuleEntry {
                priority: rule.priority.unwrap_or(0),
                source,
                table: rule.table.unwrap_or_default(),
            }
        })
        .collect())
}

/// Router from a systemd-networkd lease file (`ROUTER=a.b.c.d ...`)
pub fn parse_networkd_lease(contents: &str) -> Option<Ipv4Addr> {
    contents.lines().find_map(|line| {
        let value = line.trim().strip_prefix("ROUTER=")?;
        value.split_whitespace().find_map(|r| r.parse().ok())
    })
}

/// Router from the most recent lease in a dhclient lease file
pub fn parse_dhclient_leases(contents: &str) -> Option<Ipv4Addr> {
    contents
        .lines()
        .filter_map(|line| {
            let value = line.trim().strip_prefix("option routers")?;
            let value = value.trim().trim_end_matches(';');
            value.split(',').find_map(|r| r.trim().parse().ok())
        })
        .last()
}

/// Values from one `resolvectl dns|domain <iface>` line (`Link 2 (eth0): a b`)
pub fn parse_resolvectl_values(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split_once("):").map(|(_, values)| values))
        .flat_map(|values| values.split_whitespace())
        .map(str::to_string)
        .collect()
}

/// Nameserver addresses from resolvectl, dropping `#sni` suffixes and scoped addresses
pub fn parse_nameserver_tokens(tokens: &[String]) -> Vec<IpAddr> {
    tokens
        .iter()
        .filter(|t| !t.contains('%'))
        .filter_map(|t| t.split('#').next()?.parse().ok())
        .collect()
}

/// Search domains from resolvectl; `~` entries are routing-only and skipped
pub fn parse_search_tokens(tokens: &[String]) -> Vec<String> {
    tokens
        .iter()
        .filter(|t| !t.starts_with('~'))
        .cloned()
        .collect()
}

pub fn parse_resolv_conf(contents: &str) -> ResolverInfo {
    let mut info = ResolverInfo::default();
    let mut domain = None;

    for line in contents.lines() {
        let line = line.trim();
        if line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("nameserver") => {
                if let Some(addr) = parts.next().and_then(|a| a.parse().ok()) {
                    info.nameservers.push(addr);
                }
            }
            // The last search line wins, as in the resolver itself
            Some("search") => info.search = parts.map(str::to_string).collect(),
            Some("domain") => domain = parts.next().map(str::to_string),
            _ => {}
        }
    }

    if info.search.is_empty() {
        info.search.extend(domain);
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;

    const IP_ADDR_JSON: &str = r#"[
      {"ifindex":1,"ifname":"lo","flags":["LOOPBACK","UP"],"link_type":"loopback",
       "address":"00:00:00:00:00:00",
       "addr_info":[{"family":"inet","local":"127.0.0.1","prefixlen":8},
                    {"family":"inet6","local":"::1","prefixlen":128}]},
      {"ifindex":2,"ifname":"eth0","link_type":"ether","address":"52:54:00:12:34:56",
       "addr_info":[{"family":"inet","local":"172.16.5.10","prefixlen":24,"dynamic":true},
                    {"family":"inet6","local":"fe80::1","prefixlen":64}]},
      {"ifindex":3,"link":"eth0","ifname":"eth0.10","link_type":"ether",
       "address":"52:54:00:12:34:56",
       "addr_info":[{"family":"inet","local":"172.16.10.5","prefixlen":24}]},
      {"ifindex":4,"link":"eth0","ifname":"eth0.20","link_type":"ether","addr_info":[]},
      {}
    ]"#;

    #[test]
    fn test_parse_ip_addr_json() {
        let links = parse_ip_addr_json(IP_ADDR_JSON).unwrap();
        assert_eq!(links.len(), 4);

        assert_eq!(links[0].name, "lo");
        assert_eq!(links[0].mac, None);

        assert_eq!(links[1].index, 2);
        assert_eq!(links[1].mac.as_deref(), Some("52:54:00:12:34:56"));
        assert_eq!(links[1].addresses.len(), 1);
        assert_eq!(links[1].addresses[0].to_string(), "172.16.5.10/24");

        assert_eq!(links[2].name, "eth0.10");
        assert!(links[3].addresses.is_empty());
        assert_eq!(links[3].mac, None);
    }

    #[test]
    fn test_parse_ip_addr_json_rejects_garbage() {
        let err = parse_ip_addr_json("not json").unwrap_err();
        assert!(err.to_string().contains("Unexpected output"));
    }

    #[test]
    fn test_parse_default_routes_json() {
        let json = r#"[
          {"dst":"default","gateway":"172.16.5.1","dev":"eth0","protocol":"dhcp","metric":100},
          {"dst":"default","dev":"wg0","scope":"link"}
        ]"#;
        let routes = parse_default_routes_json(json).unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].gateway, Some("172.16.5.1".parse().unwrap()));
        assert_eq!(routes[0].dev, "eth0");
        assert_eq!(routes[1].gateway, None);

        assert!(parse_default_routes_json("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_table_routes_json() {
        let json = r#"[
          {"dst":"default","gateway":"172.16.10.1","dev":"eth0.10","flags":[]},
          {"dst":"172.16.10.0/24","dev":"eth0.10","scope":"link","prefsrc":"172.16.10.5","flags":[]},
          {"dst":"10.9.9.9","dev":"eth0.10","scope":"link","prefsrc":"172.16.10.5","flags":[]},
          {"dst":"192.168.7.0/24","dev":"eth0.10","scope":"link","flags":[]}
        ]"#;
        let routes = parse_table_routes_json(json, "101").unwrap();
        assert_eq!(
            routes,
            vec![
                TableRoute::Default {
                    gateway: "172.16.10.1".parse().unwrap(),
                    dev: "eth0.10".to_string(),
                    table: "101".to_string(),
                },
                TableRoute::Subnet {
                    network: "172.16.10.0/24".parse().unwrap(),
                    dev: "eth0.10".to_string(),
                    src: "172.16.10.5".parse().unwrap(),
                    table: "101".to_string(),
                },
                TableRoute::Subnet {
                    network: "10.9.9.9/32".parse().unwrap(),
                    dev: "eth0.10".to_string(),
                    src: "172.16.10.5".parse().unwrap(),
                    table: "101".to_string(),
                },
            ]
        );

        assert!(parse_table_routes_json("", "101").unwrap().is_empty());
        assert!(parse_table_routes_json("[]\n", "101").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rules_json() {
        let json = r#"[
          {"priority":0,"src":"all","table":"local"},
          {"priority":100,"src":"172.16.5.10","table":"eth0"},
          {"priority":101,"src":"172.16.10.0","srclen":24,"table":"101"},
          {"priority":32766,"src":"all","table":"main"}
        ]"#;
        let rules = parse_rules_json(json).unwrap();
        assert_eq!(rules.len(), 4);
        assert_eq!(rules[0].source, None);
        assert_eq!(rules[1].source.as_deref(), Some("172.16.5.10"));
        assert_eq!(rules[1].table, "eth0");
        assert_eq!(rules[2].source.as_deref(), Some("172.16.10.0/24"));
        assert_eq!(rules[3].priority, 32766);
    }

    #[test]
    fn test_parse_networkd_lease() {
        let lease = "# This is private data. Do not parse.\n\
                     ADDRESS=172.16.5.10\n\
                     NETMASK=255.255.255.0\n\
                     ROUTER=172.16.5.1\n\
                     DNS=172.16.5.2 172.16.5.3\n";
        assert_eq!(parse_networkd_lease(lease), Some("172.16.5.1".parse().unwrap()));
        assert_eq!(parse_networkd_lease("ADDRESS=10.0.0.5\n"), None);
    }

    #[test]
    fn test_parse_dhclient_leases_uses_latest() {
        let leases = r#"lease {
  interface "eth0";
  fixed-address 10.1.0.20;
  option routers 10.1.0.1;
}
lease {
  interface "eth0";
  fixed-address 10.1.0.20;
  option subnet-mask 255.255.255.0;
  option routers 10.1.0.254,10.1.0.253;
  option domain-name-servers 10.1.0.2;
}
"#;
        assert_eq!(
            parse_dhclient_leases(leases),
            Some("10.1.0.254".parse().unwrap())
        );
        assert_eq!(parse_dhclient_leases(""), None);
    }

    #[test]
    fn test_parse_resolvectl() {
        let dns = "Link 2 (eth0): 172.16.5.2 172.16.5.3#dns.example fe80::1%eth0\n";
        let tokens = parse_resolvectl_values(dns);
        assert_eq!(tokens.len(), 3);
        let servers = parse_nameserver_tokens(&tokens);
        assert_eq!(
            servers,
            vec![
                "172.16.5.2".parse::<IpAddr>().unwrap(),
                "172.16.5.3".parse::<IpAddr>().unwrap()
            ]
        );

        let domains = parse_resolvectl_values("Link 2 (eth0): corp.example ~. ~lab\n");
        assert_eq!(parse_search_tokens(&domains), vec!["corp.example"]);

        assert!(parse_resolvectl_values("Link 3 (eth0.10):\n").is_empty());
    }

    #[test]
    fn test_parse_resolv_conf() {
        let conf = "# generated\n\
                    nameserver 127.0.0.53\n\
                    nameserver 10.0.0.2\n\
                    options edns0 trust-ad\n\
                    search old.example\n\
                    search corp.example lab.example\n";
        let info = parse_resolv_conf(conf);
        assert_eq!(info.nameservers.len(), 2);
        assert_eq!(info.search, vec!["corp.example", "lab.example"]);

        let info = parse_resolv_conf("domain corp.example\nnameserver 10.0.0.2\n");
        assert_eq!(info.search, vec!["corp.example"]);
    }
}
