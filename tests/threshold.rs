// fptrap/tests/threshold.rs

use std::hint::black_box;

use fptrap::{AttachError, ExceptionKind, Policy, Settings};

fn settings() -> Settings {
    Settings {
        policy: Policy::Disable { threshold: 2 },
        ..Settings::default()
    }
}

#[test]
fn threshold_reports_n_then_stops_trapping() {
    let sentinel = fptrap::attach(settings()).expect("attach succeeds");
    assert_eq!(sentinel.policy(), Policy::Disable { threshold: 2 });
    if !sentinel.mask().contains(ExceptionKind::Underflow) {
        // No trap support on this platform.
        return;
    }

    let results = std::thread::spawn(|| {
        (0..5)
            .map(|_| black_box(f64::MIN_POSITIVE) * black_box(0.5))
            .collect::<Vec<f64>>()
    })
    .join()
    .unwrap();
    assert!(results.iter().all(|value| *value == f64::MIN_POSITIVE / 2.0));

    // Two reported, then the kind is disabled and the thread resumes with
    // underflow masked, so the last three never fault at all.
    let stats = sentinel.stats().kind(ExceptionKind::Underflow);
    assert_eq!((stats.observed, stats.reported, stats.suppressed), (2, 2, 0));
    assert!(!sentinel.mask().contains(ExceptionKind::Underflow));
}

#[test]
fn differing_settings_are_rejected() {
    let first = fptrap::attach(settings()).expect("attach succeeds");
    assert!(matches!(
        fptrap::attach(Settings::default()),
        Err(AttachError::AlreadyAttached)
    ));
    let again = fptrap::attach(settings()).expect("equal settings are accepted");
    assert!(std::ptr::eq(first, again));
    assert_eq!(again.policy(), Policy::Disable { threshold: 2 });
}
