use super::{InterfaceConfig, NetworkDocument};

pub const HEADER: &str = "# Generated by staticnet. Local changes are overwritten on the next run.\n";

impl NetworkDocument {
    /// Render the document as netplan YAML.
    ///
    /// Output depends only on the document contents and entry order, so the
    /// same document always renders to the same bytes.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(HEADER);
        out.push_str("network:\n");
        out.push_str("  version: 2\n");
        out.push_str("  renderer: networkd\n");

        if !self.ethernets.is_empty() {
            out.push_str("  ethernets:\n");
            for (name, config) in &self.ethernets {
                push_key(&mut out, 4, name);
                write_interface(config, 6, &mut out);
            }
        }

        if !self.vlans.is_empty() {
            out.push_str("  vlans:\n");
            for (name, vlan) in &self.vlans {
                push_key(&mut out, 4, name);
                push_line(&mut out, 6, &format!("id: {}", vlan.id));
                push_line(&mut out, 6, &format!("link: {}", scalar(&vlan.link)));
                write_interface(&vlan.config, 6, &mut out);
            }
        }

        out
    }
}

fn write_interface(config: &InterfaceConfig, indent: usize, out: &mut String) {
    push_line(out, indent, &format!("dhcp4: {}", config.dhcp4));
    if let Some(mac) = &config.macaddress {
        push_line(out, indent, &format!("macaddress: \"{}\"", mac));
    }

    if let Some(address) = &config.address {
        push_line(out, indent, "addresses:");
        push_line(out, indent + 2, &format!("- {}", address));
    }

    if let Some(gateway) = &config.gateway {
        push_line(out, indent, "routes:");
        push_line(out, indent + 2, "- to: default");
        push_line(out, indent + 4, &format!("via: {}", gateway));
    }

    if let Some(ns) = &config.nameservers {
        push_line(out, indent, "nameservers:");
        if !ns.addresses.is_empty() {
            push_line(out, indent + 2, "addresses:");
            for addr in &ns.addresses {
                push_line(out, indent + 4, &format!("- {}", scalar(&addr.to_string())));
            }
        }
        if !ns.search.is_empty() {
            push_line(out, indent + 2, "search:");
            for domain in &ns.search {
                push_line(out, indent + 4, &format!("- {}", scalar(domain)));
            }
        }
    }
}

fn push_key(out: &mut String, indent: usize, key: &str) {
    push_line(out, indent, &format!("{}:", scalar(key)));
}

fn push_line(out: &mut String, indent: usize, line: &str) {
    out.push_str(&" ".repeat(indent));
    out.push_str(line);
    out.push('\n');
}

/// Quote values that YAML could read as something other than a plain string
fn scalar(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '/'))
        && !value.starts_with(['-', '.']);
    if plain {
        return value.to_string();
    }
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Nameservers, VlanConfig};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_static_and_vlan() {
        let mut doc = NetworkDocument::new();
        doc.set_ethernet(
            "eth0",
            InterfaceConfig {
                dhcp4: false,
                macaddress: Some("52:54:00:12:34:56".to_string()),
                address: Some("172.16.5.10/24".parse().unwrap()),
                gateway: Some("172.16.5.1".parse().unwrap()),
                nameservers: Some(Nameservers {
                    addresses: vec!["172.16.5.2".parse().unwrap(), "fd00::53".parse().unwrap()],
                    search: vec!["corp.example".to_string()],
                }),
            },
        );
        doc.set_vlan(
            "eth0.10",
            VlanConfig {
                id: 10,
                link: "eth0".to_string(),
                config: InterfaceConfig {
                    dhcp4: false,
                    macaddress: None,
                    address: Some("172.16.10.5/24".parse().unwrap()),
                    gateway: None,
                    nameservers: None,
                },
            },
        );

        let expected = format!(
            "{}{}",
            HEADER,
            r#"network:
  version: 2
  renderer: networkd
  ethernets:
    eth0:
      dhcp4: false
      macaddress: "52:54:00:12:34:56"
      addresses:
        - 172.16.5.10/24
      routes:
        - to: default
          via: 172.16.5.1
      nameservers:
        addresses:
          - 172.16.5.2
          - "fd00::53"
        search:
          - corp.example
  vlans:
    eth0.10:
      id: 10
      link: eth0
      dhcp4: false
      addresses:
        - 172.16.10.5/24
"#
        );
        assert_eq!(doc.render(), expected);
    }

    #[test]
    fn test_render_empty_document() {
        let rendered = NetworkDocument::new().render();
        assert!(rendered.ends_with("  renderer: networkd\n"));
        assert!(!rendered.contains("ethernets"));
        assert!(!rendered.contains("vlans"));
    }

    #[test]
    fn test_scalar_quoting() {
        assert_eq!(scalar("eth0.10"), "eth0.10");
        assert_eq!(scalar("corp.example"), "corp.example");
        assert_eq!(scalar("a b"), "\"a b\"");
        assert_eq!(scalar("-x"), "\"-x\"");
        assert_eq!(scalar(""), "\"\"");
    }
}
