#[path = "common/mod.rs"]
mod common;

use chrono::Local;
use common::{FakeSystemctl, read_snapshot, record, serial, wait_for_path};
use nix::{
    sys::signal::{self, Signal},
    unistd::Pid,
};
use std::{
    fs,
    process::{Child, Command, ExitStatus, Stdio},
    thread,
    time::{Duration, Instant},
};
use tempfile::tempdir;

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> ExitStatus {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait().expect("poll child") {
            return status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            panic!("svcwatch did not exit within {timeout:?}");
        }
        thread::sleep(Duration::from_millis(50));
    }
}

#[test]
fn cancellation_mid_sleep_marks_monitor_inactive() {
    let _serial = serial();
    let temp = tempdir().expect("create tempdir");
    let dir = temp.path();
    let systemctl = FakeSystemctl::install(dir);
    systemctl.set("svcwatch.service", "active");
    systemctl.set("web.service", "active");

    let services = dir.join("services.txt");
    fs::write(&services, "svcwatch\nweb\n").unwrap();
    let status_path = dir.join("out/services_status.json");

    let mut child = Command::new(assert_cmd::cargo::cargo_bin!("svcwatch"))
        .arg("--services")
        .arg(&services)
        .arg("--output-dir")
        .arg(dir.join("out"))
        .arg("--systemctl")
        .arg(systemctl.path())
        .arg("--interval")
        .arg("1h")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn svcwatch");

    wait_for_path(&status_path);
    let first = read_snapshot(&status_path);
    assert_eq!(record(&first, "svcwatch.service")["active_state"], "active");

    thread::sleep(Duration::from_millis(300));
    let cancelled_at = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    signal::kill(Pid::from_raw(child.id() as i32), Signal::SIGINT).expect("send SIGINT");

    let status = wait_with_timeout(&mut child, Duration::from_secs(10));
    assert!(!status.success());
    assert_eq!(status.code(), Some(255));

    let snapshot = read_snapshot(&status_path);
    assert_eq!(snapshot.len(), 2);

    let monitor = record(&snapshot, "svcwatch.service");
    assert_eq!(monitor["active_state"], "inactive");
    assert!(monitor["timestamp_checked"].as_str().unwrap() >= cancelled_at.as_str());
    assert_eq!(
        monitor["timestamp_last_active"],
        record(&first, "svcwatch.service")["timestamp_last_active"]
    );

    let web = record(&snapshot, "web.service");
    assert_eq!(web["active_state"], "active");
}

#[test]
fn sigterm_is_handled_like_sigint() {
    let _serial = serial();
    let temp = tempdir().expect("create tempdir");
    let dir = temp.path();
    let systemctl = FakeSystemctl::install(dir);
    systemctl.set("monitor.service", "active");

    let services = dir.join("services.txt");
    fs::write(&services, "monitor\n").unwrap();
    let status_path = dir.join("out/services_status.json");

    let mut child = Command::new(assert_cmd::cargo::cargo_bin!("svcwatch"))
        .arg("--services")
        .arg(&services)
        .arg("--output-dir")
        .arg(dir.join("out"))
        .arg("--systemctl")
        .arg(systemctl.path())
        .arg("--self-service")
        .arg("monitor")
        .arg("--interval")
        .arg("10m")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn svcwatch");

    wait_for_path(&status_path);
    signal::kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM).expect("send SIGTERM");

    let status = wait_with_timeout(&mut child, Duration::from_secs(10));
    assert!(!status.success());

    let snapshot = read_snapshot(&status_path);
    assert_eq!(record(&snapshot, "monitor.service")["active_state"], "inactive");
}
