// fptrap/tests/underflow.rs

use std::hint::black_box;

use fptrap::{ExceptionKind, Settings};

fn gettid() -> i32 {
    unsafe { libc::syscall(libc::SYS_gettid) as i32 }
}

#[test]
fn underflow_is_reported_in_order_and_execution_continues() {
    let sentinel = fptrap::attach(Settings::default()).expect("attach succeeds");
    if !sentinel.mask().contains(ExceptionKind::Underflow) {
        // No trap support on this platform.
        return;
    }
    let before = sentinel.stats().kind(ExceptionKind::Underflow).reported;

    // Spawned threads inherit the armed floating-point state.
    let (tid, results) = std::thread::spawn(|| {
        let mut results = Vec::new();
        for _ in 0..3 {
            results.push(black_box(f64::MIN_POSITIVE) * black_box(0.5));
        }
        (gettid(), results)
    })
    .join()
    .unwrap();

    // The IEEE default result is kept: an exact subnormal.
    for value in results {
        assert_eq!(value, f64::MIN_POSITIVE / 2.0);
        assert!(value.is_subnormal());
    }

    let after = sentinel.stats().kind(ExceptionKind::Underflow).reported;
    assert!(after - before >= 3, "expected 3 new reports, got {}", after - before);

    let entries: Vec<_> = sentinel
        .journal()
        .into_iter()
        .filter(|entry| entry.event.thread_id == tid)
        .collect();
    assert_eq!(entries.len(), 3);
    assert!(entries
        .windows(2)
        .all(|pair| pair[0].event.sequence < pair[1].event.sequence));
    for entry in &entries {
        assert_eq!(entry.event.kind, ExceptionKind::Underflow);
        assert!(entry.reported);
        if let Some(location) = entry.location {
            assert!(location.file.ends_with("underflow.rs"), "{location}");
        }
    }
}

#[test]
fn attach_is_idempotent() {
    let first = fptrap::attach(Settings::default()).expect("attach succeeds");
    let second = fptrap::attach_from_env().expect("attach succeeds");
    assert!(std::ptr::eq(first, second));
    assert!(std::ptr::eq(first, fptrap::sentinel().unwrap()));
}
