// fptrap/src/trap/infrastructure/interceptor.rs

//! # Fault Interceptor
//!
//! Turns a raw fault snapshot into an [`ExceptionEvent`].

use crate::trap::ds::{next_sequence, ExceptionEvent, ExceptionKind, FaultSnapshot};
use crate::trap::infrastructure::low_level;

/// Picks the kind to report for one fault.
///
/// Flags that are both raised and trapped win, most severe first, with
/// flags newly set by this instruction preferred over stale sticky ones.
/// Failing that, the kernel's signal code is used. A delivery that matches
/// neither is `Unknown`; it is still reported.
pub fn classify(snapshot: &FaultSnapshot) -> ExceptionKind {
    let trapped = snapshot.raised.intersection(snapshot.trapped);
    trapped
        .difference(snapshot.stale)
        .highest()
        .or_else(|| trapped.highest())
        .or(snapshot.signal_kind)
        .unwrap_or(ExceptionKind::Unknown)
}

/// Builds the event for a fault on the calling thread.
pub fn capture(snapshot: &FaultSnapshot) -> ExceptionEvent {
    ExceptionEvent::new(
        classify(snapshot),
        snapshot.address,
        low_level::thread_id(),
        next_sequence(),
    )
}
