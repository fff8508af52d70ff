// fptrap/tests/abort.rs

#![cfg(all(target_os = "linux", target_arch = "x86_64"))]

use std::hint::black_box;
use std::process::Command;

use fptrap::{ExceptionKind, Policy};

/// Set in the re-executed test binary that is expected to abort.
const CHILD_ENV: &str = "FPTRAP_TEST_ABORT_CHILD";

#[test]
fn abort_exits_with_configured_status() {
    let output = Command::new(std::env::current_exe().unwrap())
        .args(["aborting_child", "--exact", "--nocapture", "--test-threads=1"])
        .env(CHILD_ENV, "1")
        .env("FPTRAP_EXCEPTIONS", "underflow")
        .env("FPTRAP_ACTION", "abort")
        .env("FPTRAP_ABORT_STATUS", "77")
        .env_remove("FPTRAP_DISABLE")
        .output()
        .unwrap();

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(77), "stderr: {stderr}");
    assert_eq!(
        stderr.matches("Warning: very small quantity (underflow) at ").count(),
        1,
        "stderr: {stderr}"
    );
    assert!(!String::from_utf8_lossy(&output.stdout).contains("survived"));
}

#[test]
fn aborting_child() {
    if std::env::var_os(CHILD_ENV).is_none() {
        return;
    }
    let sentinel = fptrap::attach_from_env().expect("attach succeeds");
    assert_eq!(sentinel.policy(), Policy::Abort);
    assert!(sentinel.mask().contains(ExceptionKind::Underflow));

    let value = black_box(f64::MIN_POSITIVE) * black_box(0.5);
    println!("survived with {value}");
}
