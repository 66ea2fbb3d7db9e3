#[path = "common/mod.rs"]
mod common;

use assert_cmd::Command;
use common::{FakeSystemctl, read_snapshot, serial};
use predicates::{prelude::*, str::contains};
use std::fs;
use tempfile::tempdir;

#[test]
fn help_lists_monitor_flags() {
    let _serial = serial();
    Command::new(assert_cmd::cargo::cargo_bin!("svcwatch"))
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("--services"))
        .stdout(contains("--probe-failure"))
        .stdout(contains("--once"));
}

#[test]
fn missing_services_list_is_reported() {
    let _serial = serial();
    let temp = tempdir().expect("create tempdir");

    Command::new(assert_cmd::cargo::cargo_bin!("svcwatch"))
        .current_dir(temp.path())
        .arg("--once")
        .assert()
        .failure()
        .stderr(contains("No services list configured"))
        .stderr(contains("NoServicesFile").not());
}

#[test]
fn unreadable_services_file_is_fatal() {
    let _serial = serial();
    let temp = tempdir().expect("create tempdir");

    Command::new(assert_cmd::cargo::cargo_bin!("svcwatch"))
        .current_dir(temp.path())
        .arg("--services")
        .arg(temp.path().join("nope.txt"))
        .arg("--once")
        .assert()
        .failure()
        .stderr(contains("Failed to read"))
        .stderr(contains("nope.txt"));
}

#[test]
fn config_file_supplies_settings_and_flags_override_it() {
    let _serial = serial();
    let temp = tempdir().expect("create tempdir");
    let dir = temp.path();
    let systemctl = FakeSystemctl::install(dir);
    systemctl.set("web.service", "active");

    let services = dir.join("services.txt");
    fs::write(&services, "web\n").unwrap();

    let config = dir.join("svcwatch.yaml");
    fs::write(
        &config,
        format!(
            "services_file: \"{}\"\noutput_dir: \"{}\"\nsystemctl: \"{}\"\nprefix: \"from_file\"\n",
            services.display(),
            dir.join("out").display(),
            systemctl.path().display()
        ),
    )
    .unwrap();

    Command::new(assert_cmd::cargo::cargo_bin!("svcwatch"))
        .arg("--config")
        .arg(&config)
        .arg("--prefix")
        .arg("from_flag")
        .arg("--once")
        .assert()
        .success()
        .stdout(contains("service_status_updated"));

    let snapshot = read_snapshot(&dir.join("out/from_flag_services_status.json"));
    assert_eq!(snapshot.len(), 1);
    assert!(!dir.join("out/from_file_services_status.json").exists());
}

#[test]
fn invalid_interval_is_rejected() {
    let _serial = serial();
    let temp = tempdir().expect("create tempdir");
    let services = temp.path().join("services.txt");
    fs::write(&services, "web\n").unwrap();

    Command::new(assert_cmd::cargo::cargo_bin!("svcwatch"))
        .arg("--services")
        .arg(&services)
        .arg("--interval")
        .arg("soon")
        .arg("--once")
        .assert()
        .failure()
        .stderr(contains("Invalid value for interval: 'soon'"));
}
