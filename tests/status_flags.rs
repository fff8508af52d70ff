// fptrap/tests/status_flags.rs

#![cfg(all(target_os = "linux", target_arch = "x86_64"))]

use std::hint::black_box;

use fptrap::{ExceptionKind, Settings};

const UNDERFLOW_FLAG: u32 = 1 << 4;
const INEXACT_FLAG: u32 = 1 << 5;
const UNDERFLOW_MASK: u32 = UNDERFLOW_FLAG << 7;

#[allow(deprecated)]
fn mxcsr() -> u32 {
    unsafe { core::arch::x86_64::_mm_getcsr() }
}

#[test]
fn host_status_flags_survive_a_trapped_fault() {
    let sentinel = fptrap::attach(Settings::default()).expect("attach succeeds");
    assert!(sentinel.mask().contains(ExceptionKind::Underflow));

    let (csr, third, tiny) = std::thread::spawn(|| {
        // Inexact is masked: sets the sticky flag only.
        let third = black_box(1.0f64) / black_box(3.0);
        // Exact subnormal: traps, but leaves no flag once masked.
        let tiny = black_box(f64::MIN_POSITIVE) * black_box(0.5);
        (mxcsr(), third, tiny)
    })
    .join()
    .unwrap();

    assert_eq!(third, 1.0 / 3.0);
    assert_eq!(tiny, f64::MIN_POSITIVE / 2.0);
    assert_ne!(csr & INEXACT_FLAG, 0, "host flag cleared: {csr:#x}");
    assert_eq!(csr & UNDERFLOW_FLAG, 0, "trap flag leaked: {csr:#x}");
    assert_eq!(csr & UNDERFLOW_MASK, 0, "underflow not re-armed: {csr:#x}");
    assert_eq!(sentinel.stats().kind(ExceptionKind::Underflow).reported, 1);
}
