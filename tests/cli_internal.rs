use staticnet::cli::run_with_args;
use std::io::Write;
use tempfile::NamedTempFile;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(contents.as_bytes()).expect("write temp file");
    file
}

#[test]
fn run_with_args_reports_missing_config_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let missing = dir.path().join("staticnet.toml");

    let err = run_with_args([
        "staticnet",
        "--config",
        missing.to_str().unwrap(),
        "verify",
    ])
    .expect_err("missing config should fail");

    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
fn run_with_args_rejects_zero_vlan_from_config() {
    let file = config_file("vlan_ids = [0]\n");

    let err = run_with_args([
        "staticnet",
        "--config",
        file.path().to_str().unwrap(),
        "scan",
    ])
    .expect_err("VLAN 0 should fail");

    assert!(err.to_string().contains("VLAN ID 0 is out of range"));
}

#[test]
fn run_with_args_flags_override_config_file() {
    // The file's pattern is invalid, the flag replaces it before validation
    let file = config_file("include = \"(\"\nexclude = \"[\"\n");

    let err = run_with_args([
        "staticnet",
        "--config",
        file.path().to_str().unwrap(),
        "verify",
        "--include",
        "^eth",
    ])
    .expect_err("exclude from file is still invalid");

    let message = format!("{:#}", err);
    assert!(message.contains("'['"), "{message}");
    assert!(!message.contains("'('"), "{message}");
}

#[test]
fn run_with_args_rejects_zero_dhcp_interval() {
    let file = config_file("[dhcp_wait]\ninterval_secs = 0\ntimeout_secs = 30\n");

    let err = run_with_args([
        "staticnet",
        "--config",
        file.path().to_str().unwrap(),
        "apply",
    ])
    .expect_err("zero interval should fail");

    assert!(err
        .to_string()
        .contains("DHCP wait interval must be greater than zero"));
}
