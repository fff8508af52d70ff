// fptrap/src/trap/ds/types.rs

//! # Exception Kind Definitions
//!
//! The IEEE-754 exception classes this library can trap, the bit-set used to
//! describe a group of them, and the post-fault actions.

use core::fmt;
use core::ops::BitOr;

/// A floating-point exception class.
///
/// Declaration order is severity order: when several status flags are raised
/// by one instruction, the lowest discriminant wins.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ExceptionKind {
    Invalid = 0,
    DivideByZero = 1,
    Overflow = 2,
    Underflow = 3,
    Inexact = 4,
    /// A fault delivered with no recognizable condition flag.
    Unknown = 5,
}

impl ExceptionKind {
    /// Number of kinds that map to a hardware trap-enable bit.
    pub const TRAPPABLE: usize = 5;

    /// Number of distinct kinds, `Unknown` included.
    pub const COUNT: usize = 6;

    /// Trappable kinds in severity order.
    pub const ALL: [ExceptionKind; Self::TRAPPABLE] = [
        ExceptionKind::Invalid,
        ExceptionKind::DivideByZero,
        ExceptionKind::Overflow,
        ExceptionKind::Underflow,
        ExceptionKind::Inexact,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Short lowercase name, as accepted in `FPTRAP_EXCEPTIONS`.
    pub const fn name(self) -> &'static str {
        match self {
            ExceptionKind::Invalid => "invalid",
            ExceptionKind::DivideByZero => "divbyzero",
            ExceptionKind::Overflow => "overflow",
            ExceptionKind::Underflow => "underflow",
            ExceptionKind::Inexact => "inexact",
            ExceptionKind::Unknown => "unknown",
        }
    }

    /// Human description used in the diagnostic line.
    pub const fn description(self) -> &'static str {
        match self {
            ExceptionKind::Invalid => "invalid operation (NaN produced)",
            ExceptionKind::DivideByZero => "division by zero",
            ExceptionKind::Overflow => "very large quantity (overflow)",
            ExceptionKind::Underflow => "very small quantity (underflow)",
            ExceptionKind::Inexact => "inexact result",
            ExceptionKind::Unknown => "unrecognized floating-point exception",
        }
    }

    /// The single-kind set, empty for `Unknown`.
    pub const fn bit(self) -> KindSet {
        match self {
            ExceptionKind::Unknown => KindSet::EMPTY,
            kind => KindSet(1 << kind as u8),
        }
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of trappable exception kinds.
///
/// Bit `n` corresponds to the kind with discriminant `n`.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct KindSet(u8);

impl KindSet {
    pub const EMPTY: Self = Self(0);
    pub const ALL: Self = Self(0b1_1111);
    /// The conservative default: underflow only.
    pub const DEFAULT: Self = ExceptionKind::Underflow.bit();

    /// Builds a set from raw bits, discarding bits that name no kind.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, kind: ExceptionKind) -> bool {
        let bit = kind.bit().0;
        bit != 0 && self.0 & bit == bit
    }

    pub const fn with(self, kind: ExceptionKind) -> Self {
        Self(self.0 | kind.bit().0)
    }

    pub const fn without(self, kind: ExceptionKind) -> Self {
        Self(self.0 & !kind.bit().0)
    }

    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// The most severe kind in the set.
    pub fn highest(self) -> Option<ExceptionKind> {
        self.iter().next()
    }

    /// Iterates members in severity order.
    pub fn iter(self) -> impl Iterator<Item = ExceptionKind> {
        ExceptionKind::ALL.into_iter().filter(move |kind| self.contains(*kind))
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }
}

impl BitOr for KindSet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl FromIterator<ExceptionKind> for KindSet {
    fn from_iter<I: IntoIterator<Item = ExceptionKind>>(iter: I) -> Self {
        iter.into_iter().fold(KindSet::EMPTY, KindSet::with)
    }
}

impl fmt::Debug for KindSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for KindSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        for (i, kind) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(kind.name())?;
        }
        Ok(())
    }
}

/// What happens after a fault has been reported.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
    /// Accept the IEEE default result and resume.
    Continue,
    /// Stop trapping this kind for the rest of the run, then resume.
    DisableKindAndContinue,
    /// Terminate the process with the configured status.
    Abort,
}

/// The configured post-fault policy.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Policy {
    #[default]
    Continue,
    Abort,
    /// Report each kind at most `threshold` times, then stop trapping it.
    Disable { threshold: u64 },
}
