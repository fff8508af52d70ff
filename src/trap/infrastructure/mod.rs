// fptrap/src/trap/infrastructure/mod.rs

//! # Trap Infrastructure Module
//!
//! The engine behind the public API: the low-level MXCSR and signal layer,
//! the dependency injection container, and the five stages every fault goes
//! through (configure once, then intercept, resolve, report, resume).

// The Dependency Injection (DI) framework.
pub mod di;

// Low-level hardware and signal layer.
pub mod low_level;

// Fault pipeline stages.
pub mod configurator;
pub mod interceptor;
pub mod reporter;
pub mod resumption;

// Counters and recent-event history.
pub mod journal;
