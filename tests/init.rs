use std::process::Command;

#[test]
fn init_creates_valid_toml() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_iacscan"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(output.status.success(), "iacscan init failed: {}", String::from_utf8_lossy(&output.stderr));

    let config_path = dir.path().join(".iacscan.toml");
    assert!(config_path.exists(), ".iacscan.toml should exist");

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[scan]"));
    assert!(content.contains("[api]"));

    // Verify it's valid TOML that iacscan-core can parse
    let config: iacscan_core::IacScanConfig = toml::from_str(&content).unwrap();
    assert_eq!(config.scan.poll_cycles(), 4);
    assert_eq!(
        config.api.report_url,
        "https://app.6pillars.ai/template-scanner-results"
    );
}

#[test]
fn report_url_is_read_from_api_table() {
    let config = iacscan_core::IacScanConfig::from_toml(
        "[api]\nreport_url = \"https://reports.internal/view\"\n",
    )
    .unwrap();
    assert_eq!(config.api.report_url, "https://reports.internal/view");
}

#[test]
fn init_refuses_if_exists() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".iacscan.toml"), "# existing").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_iacscan"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
}

#[test]
fn scan_without_pull_request_settings_fails() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_iacscan"))
        .arg("scan")
        .current_dir(dir.path())
        .env_clear()
        .output()
        .unwrap();

    assert!(!output.status.success());
}
