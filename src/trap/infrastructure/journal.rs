// fptrap/src/trap/infrastructure/journal.rs

//! # Event Journal and Counters
//!
//! Per-kind counters and a bounded history of recent events, written from
//! the fault path and read at exit for the summary.

use core::fmt::{self, Write};
use core::sync::atomic::{AtomicU64, Ordering};
use std::collections::BTreeMap;

use spin::Mutex;

use crate::trap::collections::RingBuffer;
use crate::trap::ds::{ExceptionEvent, ExceptionKind, SourceLocation};

pub const JOURNAL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JournalEntry {
    pub event: ExceptionEvent,
    pub location: Option<SourceLocation<'static>>,
    /// `false` when the occurrence was suppressed by the threshold policy.
    pub reported: bool,
}

/// Recent events, oldest evicted first.
pub struct Journal {
    entries: Mutex<RingBuffer<JournalEntry>>,
    dropped: AtomicU64,
}

impl Journal {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(RingBuffer::with_capacity(capacity)),
            dropped: AtomicU64::new(0),
        }
    }

    /// Never waits: if the buffer is busy the entry is counted as dropped.
    pub fn record(&self, entry: JournalEntry) {
        match self.entries.try_lock() {
            Some(mut entries) => {
                entries.push(entry);
            }
            None => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Entries lost to contention.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Entries evicted because the buffer was full. Not for use in fault
    /// context.
    pub fn evicted(&self) -> u64 {
        self.entries.lock().overwritten()
    }

    /// Copies the entries out, oldest first. Not for use in fault context.
    pub fn snapshot(&self) -> Vec<JournalEntry> {
        self.entries.lock().to_vec()
    }
}

/// Counts for one kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindStats {
    pub observed: u64,
    pub reported: u64,
    pub suppressed: u64,
}

/// A point-in-time copy of the counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    per_kind: [KindStats; ExceptionKind::COUNT],
    pub report_failures: u64,
    pub journal_dropped: u64,
    /// Older entries pushed out of the journal; absent from location counts.
    pub journal_evicted: u64,
}

impl Stats {
    pub fn kind(&self, kind: ExceptionKind) -> KindStats {
        self.per_kind[kind.index()]
    }

    pub fn total_observed(&self) -> u64 {
        self.per_kind.iter().map(|s| s.observed).sum()
    }

    pub fn total_reported(&self) -> u64 {
        self.per_kind.iter().map(|s| s.reported).sum()
    }
}

#[derive(Default)]
pub struct Counters {
    observed: [AtomicU64; ExceptionKind::COUNT],
    reported: [AtomicU64; ExceptionKind::COUNT],
    suppressed: [AtomicU64; ExceptionKind::COUNT],
    report_failures: AtomicU64,
}

impl Counters {
    pub fn record(&self, kind: ExceptionKind, reported: bool) {
        let i = kind.index();
        self.observed[i].fetch_add(1, Ordering::Relaxed);
        if reported {
            self.reported[i].fetch_add(1, Ordering::Relaxed);
        } else {
            self.suppressed[i].fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn report_failed(&self) {
        self.report_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, journal_dropped: u64, journal_evicted: u64) -> Stats {
        let mut per_kind = [KindStats::default(); ExceptionKind::COUNT];
        for (i, stats) in per_kind.iter_mut().enumerate() {
            *stats = KindStats {
                observed: self.observed[i].load(Ordering::Relaxed),
                reported: self.reported[i].load(Ordering::Relaxed),
                suppressed: self.suppressed[i].load(Ordering::Relaxed),
            };
        }
        Stats {
            per_kind,
            report_failures: self.report_failures.load(Ordering::Relaxed),
            journal_dropped,
            journal_evicted,
        }
    }
}

/// Writes the exit summary: one line per kind seen, then each distinct
/// location with its occurrence count. Location counts only cover
/// `entries`; events evicted or dropped from the journal are totalled
/// separately so the list never silently undercounts.
pub fn write_summary<W: Write>(out: &mut W, stats: &Stats, entries: &[JournalEntry]) -> fmt::Result {
    writeln!(out, "fptrap summary: {} exception(s) observed", stats.total_observed())?;
    for kind in ExceptionKind::ALL.into_iter().chain([ExceptionKind::Unknown]) {
        let s = stats.kind(kind);
        if s.observed == 0 {
            continue;
        }
        writeln!(
            out,
            "  {kind}: observed {}, reported {}, suppressed {}",
            s.observed, s.reported, s.suppressed
        )?;
    }

    let mut locations: BTreeMap<(ExceptionKind, Option<SourceLocation<'static>>), u64> = BTreeMap::new();
    for entry in entries {
        *locations.entry((entry.event.kind, entry.location)).or_default() += 1;
    }
    for ((kind, location), count) in &locations {
        match location {
            Some(location) => writeln!(out, "  {count:>6}  {kind} at {location}")?,
            None => writeln!(out, "  {count:>6}  {kind} at unresolved addresses")?,
        }
    }

    if stats.report_failures > 0 {
        writeln!(out, "  {} report(s) could not be written", stats.report_failures)?;
    }
    if stats.journal_evicted > 0 {
        writeln!(
            out,
            "  {} older event(s) evicted; locations cover the most recent {}",
            stats.journal_evicted,
            entries.len()
        )?;
    }
    if stats.journal_dropped > 0 {
        writeln!(out, "  {} event(s) missing from the location list", stats.journal_dropped)?;
    }
    Ok(())
}
