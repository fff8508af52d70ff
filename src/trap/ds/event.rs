// fptrap/src/trap/ds/event.rs

//! # Exception Events and Source Locations

use super::types::ExceptionKind;
use core::cell::Cell;
use core::fmt;

thread_local! {
    // Const-initialized and drop-free, so touching it from a signal handler
    // never allocates or registers a destructor.
    static NEXT_SEQUENCE: Cell<u64> = const { Cell::new(1) };
}

/// Returns the next per-thread event ordinal, starting at 1.
pub fn next_sequence() -> u64 {
    NEXT_SEQUENCE.with(|next| {
        let sequence = next.get();
        next.set(sequence.wrapping_add(1));
        sequence
    })
}

/// One hardware trap delivery, as seen by the interceptor.
///
/// Created at fault time and never modified afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionEvent {
    pub kind: ExceptionKind,
    /// Absolute address of the faulting instruction.
    pub address: usize,
    /// Kernel thread id of the faulting thread.
    pub thread_id: i32,
    /// Monotonic ordinal within `thread_id`.
    pub sequence: u64,
}

impl ExceptionEvent {
    pub const fn new(kind: ExceptionKind, address: usize, thread_id: i32, sequence: u64) -> Self {
        Self {
            kind,
            address,
            thread_id,
            sequence,
        }
    }
}

/// A resolved `file:line` pair, borrowed from the load-time line tables.
///
/// Resolution failures are expressed as `Option::None` (unresolved).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceLocation<'a> {
    pub file: &'a str,
    pub line: u32,
}

impl<'a> SourceLocation<'a> {
    pub const fn new(file: &'a str, line: u32) -> Self {
        Self { file, line }
    }
}

impl fmt::Display for SourceLocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic_per_thread() {
        let first = next_sequence();
        let second = next_sequence();
        assert_eq!(second, first + 1);

        let other = std::thread::spawn(next_sequence).join().unwrap();
        assert_eq!(other, 1);
    }

    #[test]
    fn location_displays_as_file_colon_line() {
        let location = SourceLocation::new("dot_product.cu", 18);
        assert_eq!(location.to_string(), "dot_product.cu:18");
    }
}
