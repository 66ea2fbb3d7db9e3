#[path = "common/mod.rs"]
mod common;

use assert_cmd::Command;
use common::{FakeSystemctl, count_events, diagnostics, read_snapshot, record, serial};
use std::{fs, path::Path};
use tempfile::tempdir;

fn run_once(dir: &Path, systemctl: &FakeSystemctl, services: &Path, extra: &[&str]) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("svcwatch"));
    cmd.arg("--services")
        .arg(services)
        .arg("--output-dir")
        .arg(dir.join("out"))
        .arg("--systemctl")
        .arg(systemctl.path())
        .arg("--once")
        .args(extra);
    cmd
}

#[test]
fn once_publishes_snapshot_and_diagnostics() {
    let _serial = serial();
    let temp = tempdir().expect("create tempdir");
    let dir = temp.path();
    let systemctl = FakeSystemctl::install(dir);
    systemctl.set("web.service", "active");
    systemctl.set("worker.service", "failed");

    let services = dir.join("services.txt");
    fs::write(&services, "web\nworker.service\nnot a name\n").unwrap();

    let output = run_once(dir, &systemctl, &services, &[])
        .output()
        .expect("run svcwatch");
    assert!(output.status.success(), "{output:?}");

    let events = diagnostics(&output.stdout);
    assert_eq!(count_events(&events, "service_skipped"), 1);
    assert_eq!(count_events(&events, "service_status_updated"), 1);
    assert!(events.iter().all(|event| event["timestamp"].is_string()));

    let snapshot = read_snapshot(&dir.join("out/services_status.json"));
    assert_eq!(snapshot.len(), 2);

    let web = record(&snapshot, "web.service");
    assert_eq!(web["service_name"], "web");
    assert_eq!(web["active_state"], "active");
    assert_eq!(web["sub_state"], "running");
    assert_eq!(web["timestamp_started"], "2024-01-15 10:30:00");
    assert_eq!(web["timestamp_last_active"], web["timestamp_checked"]);
    assert!(web["account"].is_string());

    let worker = record(&snapshot, "worker.service");
    assert_eq!(worker["active_state"], "failed");
    assert!(worker.get("timestamp_last_active").is_none());
}

#[test]
fn last_active_is_carried_across_runs() {
    let _serial = serial();
    let temp = tempdir().expect("create tempdir");
    let dir = temp.path();
    let systemctl = FakeSystemctl::install(dir);
    systemctl.set("web.service", "active");

    let services = dir.join("services.txt");
    fs::write(&services, "web\n").unwrap();
    let status_path = dir.join("out/services_status.json");

    run_once(dir, &systemctl, &services, &[]).assert().success();
    let first = read_snapshot(&status_path);
    let last_active = record(&first, "web.service")["timestamp_last_active"].clone();
    assert!(last_active.is_string());

    systemctl.set("web.service", "inactive");
    run_once(dir, &systemctl, &services, &[]).assert().success();
    let second = read_snapshot(&status_path);

    assert_eq!(second.len(), 1);
    let web = record(&second, "web.service");
    assert_eq!(web["active_state"], "inactive");
    assert_eq!(web["timestamp_last_active"], last_active);
    assert!(
        web["timestamp_checked"].as_str().unwrap() >= last_active.as_str().unwrap()
    );
}

#[test]
fn log_tail_is_published_with_malformed_lines_dropped() {
    let _serial = serial();
    let temp = tempdir().expect("create tempdir");
    let dir = temp.path();
    let systemctl = FakeSystemctl::install(dir);
    systemctl.set("web.service", "active");

    let log = dir.join("web.log");
    let mut content = String::new();
    for n in 1..=150 {
        match n {
            70 | 110 | 140 => content.push_str("{\"message\": oops}\n"),
            90 => content.push_str(&format!(
                "{{\"module\", \"api\", \"line_num\", {n}, \"message\": \"repaired\"}}\n"
            )),
            _ => content.push_str(&format!("{{\"message\": \"entry {n}\"}}\n")),
        }
    }
    fs::write(&log, content).unwrap();

    let services = dir.join("services.csv");
    fs::write(
        &services,
        format!(
            "service_name,log_path\nweb,{}\nworker,{}\n",
            log.display(),
            dir.join("missing.log").display()
        ),
    )
    .unwrap();
    systemctl.set("worker.service", "active");

    let output = run_once(dir, &systemctl, &services, &[])
        .output()
        .expect("run svcwatch");
    assert!(output.status.success(), "{output:?}");

    let events = diagnostics(&output.stdout);
    assert_eq!(count_events(&events, "log_collection_started"), 1);
    assert_eq!(count_events(&events, "log_line_parsing_failed"), 3);
    assert!(
        events
            .iter()
            .filter(|event| event["event"] == "log_line_parsing_failed")
            .all(|event| event["service_name"] == "web"
                && event["line"] == "{\"message\": oops}")
    );

    let raw = fs::read_to_string(dir.join("out/logs/web.json")).unwrap();
    let records: Vec<serde_json::Value> = serde_json::from_str(&raw).unwrap();
    assert_eq!(records.len(), 97);
    assert_eq!(records[0]["message"], "entry 51");
    assert!(records.iter().any(|record| record["module"] == "api"));
    assert!(!dir.join("out/logs/worker.json").exists());
}

#[test]
fn probe_failures_are_isolated_by_default() {
    let _serial = serial();
    let temp = tempdir().expect("create tempdir");
    let dir = temp.path();
    let systemctl = FakeSystemctl::install(dir);
    systemctl.set("web.service", "active");

    let services = dir.join("services.txt");
    fs::write(&services, "ghost\nweb\n").unwrap();

    let output = run_once(dir, &systemctl, &services, &[])
        .output()
        .expect("run svcwatch");
    assert!(output.status.success(), "{output:?}");

    let events = diagnostics(&output.stdout);
    assert_eq!(count_events(&events, "service_probe_failed"), 1);

    let snapshot = read_snapshot(&dir.join("out/services_status.json"));
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0]["service_id"], "web.service");
}

#[test]
fn abort_cycle_policy_writes_nothing() {
    let _serial = serial();
    let temp = tempdir().expect("create tempdir");
    let dir = temp.path();
    let systemctl = FakeSystemctl::install(dir);
    systemctl.set("web.service", "active");

    let services = dir.join("services.txt");
    fs::write(&services, "web\nghost\n").unwrap();

    run_once(
        dir,
        &systemctl,
        &services,
        &["--probe-failure", "abort-cycle"],
    )
    .assert()
    .failure()
    .stderr(predicates::str::contains("ghost"));

    assert!(!dir.join("out/services_status.json").exists());
}

#[test]
fn prefix_namespaces_every_artifact() {
    let _serial = serial();
    let temp = tempdir().expect("create tempdir");
    let dir = temp.path();
    let systemctl = FakeSystemctl::install(dir);
    systemctl.set("web.service", "active");

    let log = dir.join("web.log");
    fs::write(&log, "{\"message\": \"hello\"}\n").unwrap();
    let services = dir.join("services.csv");
    fs::write(&services, format!("service_name,log_path\nweb,{}\n", log.display())).unwrap();

    run_once(dir, &systemctl, &services, &["--prefix", "edge"])
        .assert()
        .success();

    assert!(dir.join("out/edge_services_status.json").exists());
    assert!(dir.join("out/logs/edge_web.json").exists());
    assert!(!dir.join("out/services_status.json").exists());
}
