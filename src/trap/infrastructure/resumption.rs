// fptrap/src/trap/infrastructure/resumption.rs

//! # Resumption Controller
//!
//! Decides what happens after each reported fault. Per kind the controller
//! is a small state machine:
//!
//! ```text
//!   Armed --(threshold reached, Disable policy)--> Disabled
//!   Armed --(real event, Abort policy)-----------> Aborted   (terminal, reported once)
//! ```
//!
//! All state is atomic so faults on several threads can decide concurrently.

use core::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};

use crate::trap::ds::{Action, ExceptionEvent, ExceptionKind, KindSet, Policy};

/// Process-wide set of trapped kinds. Only ever narrowed after attach.
#[derive(Debug)]
pub struct ExceptionMask(AtomicU8);

impl ExceptionMask {
    pub const fn new(kinds: KindSet) -> Self {
        Self(AtomicU8::new(kinds.bits()))
    }

    pub fn current(&self) -> KindSet {
        KindSet::from_bits(self.0.load(Ordering::Acquire))
    }

    pub fn contains(&self, kind: ExceptionKind) -> bool {
        self.current().contains(kind)
    }

    /// Removes `kind`. Returns whether this call was the one that removed it.
    pub fn disable(&self, kind: ExceptionKind) -> bool {
        let bit = kind.bit().bits();
        let previous = self.0.fetch_and(!bit, Ordering::AcqRel);
        previous & bit != 0
    }
}

/// Outcome of [`ResumptionController::decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub action: Action,
    /// Whether this occurrence gets a diagnostic line.
    pub report: bool,
}

impl Decision {
    const fn new(action: Action, report: bool) -> Self {
        Self { action, report }
    }
}

pub struct ResumptionController {
    policy: Policy,
    counts: [AtomicU64; ExceptionKind::COUNT],
    aborted: AtomicBool,
}

impl ResumptionController {
    pub fn new(policy: Policy) -> Self {
        Self {
            policy,
            counts: Default::default(),
            aborted: AtomicBool::new(false),
        }
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// Records one occurrence of `event.kind` and picks the post-fault action.
    pub fn decide(&self, event: &ExceptionEvent) -> Decision {
        let kind = event.kind;
        let seen = self.counts[kind.index()].fetch_add(1, Ordering::AcqRel) + 1;

        match self.policy {
            Policy::Continue => Decision::new(Action::Continue, true),
            // A delivery without a recognizable flag is not a real event.
            Policy::Abort if kind == ExceptionKind::Unknown => Decision::new(Action::Continue, true),
            // Only the first aborting fault is reported; faults racing in
            // on other threads abort quietly.
            Policy::Abort => {
                let first = !self.aborted.swap(true, Ordering::AcqRel);
                Decision::new(Action::Abort, first)
            }
            // Nothing to disable for a kind without a trap-enable bit.
            Policy::Disable { .. } if kind == ExceptionKind::Unknown => {
                Decision::new(Action::Continue, true)
            }
            Policy::Disable { threshold } => {
                let threshold = threshold.max(1);
                if seen < threshold {
                    Decision::new(Action::Continue, true)
                } else {
                    // Stragglers already in flight on other threads when the
                    // kind was disabled land here with `seen > threshold`.
                    Decision::new(Action::DisableKindAndContinue, seen == threshold)
                }
            }
        }
    }
}
