use std::io::Write;
use std::process::{Command, Output};
use tempfile::NamedTempFile;

fn staticnet(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_staticnet"))
        .args(args)
        .env_remove("STATICNET_CONFIG")
        .env_remove("STATICNET_VLANS")
        .env_remove("STATICNET_INCLUDE")
        .env_remove("STATICNET_EXCLUDE")
        .env_remove("STATICNET_NO_PBR")
        .env_remove("STATICNET_NO_GATEWAY_FALLBACK")
        .env_remove("STATICNET_DOCUMENT")
        .env_remove("STATICNET_RT_TABLES")
        .env_remove("STATICNET_HOOK_DIR")
        .env_remove("STATICNET_DHCP_TIMEOUT")
        .output()
        .expect("run binary")
}

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(contents.as_bytes()).expect("write temp file");
    file
}

#[test]
fn test_cli_help_lists_subcommands() {
    let output = staticnet(&["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for cmd in ["apply", "verify", "scan", "reapply"] {
        assert!(stdout.contains(cmd), "missing {cmd} in help:\n{stdout}");
    }
}

#[test]
fn test_cli_rejects_invalid_include_pattern() {
    let output = staticnet(&["verify", "--include", "eth(0"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("Error: "));
    assert!(stderr.contains("Invalid interface pattern 'eth(0'"));
}

#[test]
fn test_cli_rejects_out_of_range_vlan() {
    let output = staticnet(&["apply", "--vlan", "10,4095"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("VLAN ID 4095 is out of range (1-4094)"));
}

#[test]
fn test_cli_rejects_non_numeric_vlan() {
    let output = staticnet(&["apply", "--vlan", "ten"]);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--vlan"));
}

#[test]
fn test_cli_rejects_unknown_config_keys() {
    let file = config_file("vlan_ids = [10]\nbridge = \"br0\"\n");

    let output = staticnet(&["--config", file.path().to_str().unwrap(), "scan"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to parse config file"));
    assert!(stderr.contains("bridge"));
}

#[test]
fn test_cli_config_file_values_are_validated() {
    let file = config_file("exclude = \"[\"\n");

    let output = staticnet(&["--config", file.path().to_str().unwrap(), "verify"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid interface pattern '['"));
}

#[test]
fn test_cli_reapply_requires_interface() {
    let output = Command::new(env!("CARGO_BIN_EXE_staticnet"))
        .arg("reapply")
        .env_remove("IFACE")
        .output()
        .expect("run binary");

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--iface"));
}

#[test]
fn test_cli_help_names_environment_variables() {
    let output = staticnet(&["apply", "--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for var in [
        "STATICNET_NO_PBR",
        "STATICNET_NO_GATEWAY_FALLBACK",
        "STATICNET_DOCUMENT",
        "STATICNET_RT_TABLES",
        "STATICNET_HOOK_DIR",
        "STATICNET_DHCP_TIMEOUT",
    ] {
        assert!(stdout.contains(var), "missing {var} in help:\n{stdout}");
    }
}

#[test]
fn test_cli_reads_dhcp_timeout_from_environment() {
    let output = Command::new(env!("CARGO_BIN_EXE_staticnet"))
        .args(["apply"])
        .env_remove("STATICNET_CONFIG")
        .env_remove("STATICNET_VLANS")
        .env("STATICNET_DHCP_TIMEOUT", "soon")
        .output()
        .expect("run binary");

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--dhcp-timeout"));
    assert!(stderr.contains("soon"));
}
