// fptrap/src/trap/api.rs

//! # Public API for the Trap Subsystem
//!
//! Attaching is normally done by the library's ELF constructor when it is
//! built with the `preload` feature and loaded with `LD_PRELOAD`. Programs
//! that link the crate directly call [`attach`] or [`attach_from_env`]
//! themselves. Every thread that calls either one is armed.

use crate::config::Settings;
use crate::trap::ds::AttachError;
use crate::trap::infrastructure::di::{self, container::Sentinel};

/// Attaches with explicit settings and returns the process-wide sentinel.
///
/// The first successful call wins. A later call with equal settings returns
/// the same sentinel; one with different settings fails with
/// [`AttachError::AlreadyAttached`] rather than silently ignoring them.
pub fn attach(settings: Settings) -> Result<&'static Sentinel, AttachError> {
    di::attach(settings)
}

/// Attaches with settings read from the `FPTRAP_*` environment variables.
///
/// Once attached, returns the existing sentinel whatever the environment
/// says, after arming the calling thread.
///
/// Invalid values are logged and replaced by their defaults.
pub fn attach_from_env() -> Result<&'static Sentinel, AttachError> {
    if let Some(sentinel) = di::joined() {
        return Ok(sentinel);
    }
    let (settings, errors) = Settings::from_env();
    if settings.disabled {
        return Err(AttachError::Disabled);
    }
    crate::logging::init(&settings.log_filter);
    for error in &errors {
        tracing::warn!(%error, "ignoring invalid setting");
    }
    di::attach(settings)
}

/// The attached sentinel, or `None` before attaching.
pub fn sentinel() -> Option<&'static Sentinel> {
    di::sentinel()
}
