// fptrap/src/trap/ds/context.rs

//! # Fault Snapshot Structures
//!
//! Platform-neutral view of a floating-point fault, extracted from the saved
//! machine context by the low-level layer, and the verdict that is written
//! back into it before the handler returns.

use super::types::{ExceptionKind, KindSet};

/// The machine state that matters for classifying one fault delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultSnapshot {
    /// Address of the faulting instruction.
    pub address: usize,
    /// Condition flags set in the floating-point status register.
    pub raised: KindSet,
    /// Kinds whose traps were enabled when the instruction executed.
    pub trapped: KindSet,
    /// The kind reported by the kernel's signal code, if it named one.
    pub signal_kind: Option<ExceptionKind>,
    /// Flags that were already set before this instruction ran, as far as
    /// the faulting thread knows. Status flags are sticky, so these may
    /// still show up in `raised`.
    pub stale: KindSet,
}

impl FaultSnapshot {
    pub const fn new(address: usize, raised: KindSet, trapped: KindSet) -> Self {
        Self {
            address,
            raised,
            trapped,
            signal_kind: None,
            stale: KindSet::EMPTY,
        }
    }

    pub const fn with_signal_kind(mut self, kind: Option<ExceptionKind>) -> Self {
        self.signal_kind = kind;
        self
    }

    pub const fn with_stale(mut self, stale: KindSet) -> Self {
        self.stale = stale;
        self
    }
}

/// How the low-level layer must leave the interrupted thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Let the faulting instruction complete untrapped, then re-enable
    /// trapping for `rearm`.
    Resume { rearm: KindSet },
    /// Terminate the process immediately.
    Abort { status: i32 },
}
