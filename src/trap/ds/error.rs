// fptrap/src/trap/ds/error.rs

//! # Error Types
//!
//! Load-time failures carry context and may allocate. Failures on the fault
//! path (`ReportError`) are plain values so they can be produced inside a
//! signal handler.

use super::types::ExceptionKind;
use std::io;
use std::path::PathBuf;

/// A configuration value could not be honored. Never fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}: unknown exception kind `{value}`")]
    UnknownKind { var: &'static str, value: String },

    #[error("{var}: unknown action `{value}` (expected continue, abort or disable)")]
    UnknownAction { var: &'static str, value: String },

    #[error("{var}: unknown symbol scope `{value}` (expected all, main or none)")]
    UnknownScope { var: &'static str, value: String },

    #[error("{var}: invalid number `{value}`")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var}: {value} is out of range")]
    OutOfRange { var: &'static str, value: u64 },

    /// The platform cannot trap on this kind; it stays masked.
    #[error("trapping on {0} is not supported on this platform")]
    UnsupportedKind(ExceptionKind),

    /// Trapping is not available at all on this platform.
    #[error("floating-point trapping is not supported on this platform")]
    UnsupportedPlatform,
}

/// Debug information for a module could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum SymbolError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse object file: {0}")]
    Object(#[from] object::read::Error),

    #[error("failed to parse DWARF: {0}")]
    Dwarf(#[from] gimli::Error),
}

/// Attaching the library to the current process failed.
#[derive(Debug, thiserror::Error)]
pub enum AttachError {
    #[error("attachment disabled by FPTRAP_DISABLE")]
    Disabled,

    /// The process is already attached with different settings.
    #[error("already attached with different settings")]
    AlreadyAttached,

    #[error("failed to install {signal} handler: {source}")]
    SignalInstall {
        signal: &'static str,
        #[source]
        source: io::Error,
    },
}

/// A diagnostic line could not be produced or written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReportError {
    #[error("diagnostic line exceeded the report buffer")]
    Truncated,

    #[error("write to stderr failed (errno {0})")]
    Write(i32),
}
