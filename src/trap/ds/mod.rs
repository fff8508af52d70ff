// fptrap/src/trap/ds/mod.rs

//! # Trap Data Structures Module
//!
//! Exception kinds, fault snapshots, events and error types shared by the
//! configurator, interceptor, resolver, reporter and resumption controller.
//! Everything that crosses the fault path is `Copy` and allocation-free.

pub mod types;
pub mod context;
pub mod event;
pub mod error;

pub use self::types::{Action, ExceptionKind, KindSet, Policy};

pub use self::context::{FaultSnapshot, Verdict};

pub use self::event::{next_sequence, ExceptionEvent, SourceLocation};

pub use self::error::{AttachError, ConfigError, ReportError, SymbolError};
