// fptrap/src/trap/infrastructure/di/traits.rs

//! # Dependency Injection Traits
//!
//! The seams between the engine and the host platform. Production code plugs
//! in the MXCSR controller, the DWARF symbolizer and raw stderr; tests plug in
//! fakes. `LocationResolver` and `DiagnosticSink` are called from inside a
//! signal handler, so implementations must not allocate or take locks that
//! the interrupted thread could hold.

use crate::trap::ds::{ConfigError, KindSet, ReportError, SourceLocation};

/// Interface for the floating-point control register.
pub trait FpControl: Send + Sync {
    /// Kinds this platform can trap on.
    fn supported(&self) -> KindSet;

    /// Clears pending status flags and enables traps for exactly `kinds` on
    /// the calling thread. Threads created afterwards inherit the setting.
    fn arm(&self, kinds: KindSet) -> Result<(), ConfigError>;

    /// Kinds currently trapped on the calling thread.
    fn armed(&self) -> KindSet;
}

/// Interface for the Location Resolver.
pub trait LocationResolver: Send + Sync {
    /// Maps an absolute instruction address to a source location.
    fn resolve(&self, address: usize) -> Option<SourceLocation<'_>>;
}

/// Interface for the diagnostic output stream.
pub trait DiagnosticSink: Send + Sync {
    /// Emits one complete line, newline included.
    fn emit(&self, line: &[u8]) -> Result<(), ReportError>;
}
