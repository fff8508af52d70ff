// fptrap/src/trap/mod.rs

//! # Floating-Point Trap Subsystem
//!
//! Arms hardware traps for selected IEEE-754 exceptions, catches the
//! resulting `SIGFPE`, reports the faulting source line and resumes the
//! program (or stops it, per policy).

// Make submodules accessible within the trap crate.
mod api;
mod collections;
mod ds;
mod infrastructure;

// Publicly re-export the entire API module.
pub use self::api::*;

// Re-export key data structures that users of the API might need directly.
pub use self::ds::{
    Action, ExceptionKind, KindSet, Policy,               // Kinds and policies
    ExceptionEvent, FaultSnapshot, SourceLocation, Verdict, // Per-fault values
    AttachError, ConfigError, ReportError, SymbolError,   // Errors
};

pub use self::infrastructure::di::container::Sentinel;
pub use self::infrastructure::di::traits::{DiagnosticSink, FpControl, LocationResolver};
pub use self::infrastructure::journal::{JournalEntry, KindStats, Stats};
pub use self::infrastructure::low_level::HardwareFpControl;
pub use self::infrastructure::reporter::{format_report, StderrSink, FALLBACK_LINE};
pub use self::infrastructure::resumption::{Decision, ExceptionMask, ResumptionController};
pub use self::infrastructure::{configurator, interceptor};
