// fptrap/src/trap/infrastructure/di/container.rs

//! # Sentinel Container
//!
//! Owns everything the fault path needs: the settings read at attach time,
//! the process exception mask, the resumption state machine, the resolver
//! and the output sink. Built once, then only read (or atomically narrowed)
//! from signal context.

use super::traits::{DiagnosticSink, LocationResolver};
use crate::config::Settings;
use crate::trap::ds::{Action, FaultSnapshot, KindSet, Policy, Verdict};
use crate::trap::infrastructure::interceptor;
use crate::trap::infrastructure::journal::{self, Counters, Journal, JournalEntry, Stats, JOURNAL_CAPACITY};
use crate::trap::infrastructure::reporter;
use crate::trap::infrastructure::resumption::{ExceptionMask, ResumptionController};

pub struct Sentinel {
    settings: Settings,
    mask: ExceptionMask,
    controller: ResumptionController,
    resolver: &'static dyn LocationResolver,
    sink: Box<dyn DiagnosticSink>,
    journal: Journal,
    counters: Counters,
}

impl Sentinel {
    /// Creates a `Sentinel` by injecting its dependencies. `mask` holds the
    /// kinds the hardware was armed for, as returned by
    /// `configurator::configure`.
    pub fn new(
        settings: Settings,
        mask: ExceptionMask,
        resolver: &'static dyn LocationResolver,
        sink: Box<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            controller: ResumptionController::new(settings.policy),
            mask,
            settings,
            resolver,
            sink,
            journal: Journal::with_capacity(JOURNAL_CAPACITY),
            counters: Counters::default(),
        }
    }

    /// The fault pipeline: classify, decide, resolve, report, record.
    /// Async-signal-safe.
    pub fn on_fault(&self, snapshot: &FaultSnapshot) -> Verdict {
        let event = interceptor::capture(snapshot);
        let decision = self.controller.decide(&event);

        let location = if decision.report {
            self.resolver.resolve(event.address)
        } else {
            None
        };
        if decision.report && reporter::report(&*self.sink, &event, location).is_err() {
            self.counters.report_failed();
        }
        self.counters.record(event.kind, decision.report);
        self.journal.record(JournalEntry {
            event,
            location,
            reported: decision.report,
        });

        match decision.action {
            Action::Continue => {}
            Action::DisableKindAndContinue => {
                self.mask.disable(event.kind);
            }
            Action::Abort => {
                return Verdict::Abort {
                    status: self.settings.abort_status,
                }
            }
        }
        Verdict::Resume {
            rearm: self.mask.current(),
        }
    }

    /// Kinds currently trapped process-wide.
    pub fn mask(&self) -> KindSet {
        self.mask.current()
    }

    pub fn policy(&self) -> Policy {
        self.controller.policy()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn stats(&self) -> Stats {
        self.counters.snapshot(self.journal.dropped(), self.journal.evicted())
    }

    /// Recent events, oldest first.
    pub fn journal(&self) -> Vec<JournalEntry> {
        self.journal.snapshot()
    }

    /// The exit summary as text.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = journal::write_summary(&mut out, &self.stats(), &self.journal());
        out
    }
}
