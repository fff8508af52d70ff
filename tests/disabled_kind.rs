// fptrap/tests/disabled_kind.rs

use std::hint::black_box;

use fptrap::{ExceptionKind, KindSet, Settings};

#[test]
fn only_configured_kinds_are_reported() {
    let settings = Settings {
        exceptions: KindSet::EMPTY.with(ExceptionKind::Overflow),
        ..Settings::default()
    };
    let sentinel = fptrap::attach(settings).expect("attach succeeds");
    if !sentinel.mask().contains(ExceptionKind::Overflow) {
        // No trap support on this platform.
        return;
    }
    assert!(!sentinel.mask().contains(ExceptionKind::Underflow));

    let (tiny, huge) = std::thread::spawn(|| {
        let tiny = black_box(f64::MIN_POSITIVE) * black_box(0.25);
        let huge = black_box(f64::MAX) * black_box(2.0);
        (tiny, huge)
    })
    .join()
    .unwrap();
    assert_eq!(tiny, f64::MIN_POSITIVE / 4.0);
    assert_eq!(huge, f64::INFINITY);

    let stats = sentinel.stats();
    assert_eq!(stats.kind(ExceptionKind::Underflow).observed, 0);
    assert_eq!(stats.kind(ExceptionKind::Overflow).reported, 1);
    let kinds: Vec<_> = sentinel.journal().iter().map(|entry| entry.event.kind).collect();
    assert_eq!(kinds, [ExceptionKind::Overflow]);
}
