// fptrap/src/trap/infrastructure/di/mod.rs

//! # Dependency Injection System - Global Access and Initialization
//!
//! Manages the global `Sentinel` and the order in which attaching brings the
//! pieces up. The sentinel is published through a `spin::Once`, so the
//! signal handlers reach it with a single atomic load and no lock.

pub mod container;
pub mod traits;

use self::container::Sentinel;
use self::traits::{FpControl, LocationResolver};
use crate::config::Settings;
use crate::symbols::Symbolizer;
use crate::trap::ds::{AttachError, FaultSnapshot, KindSet, Verdict};
use crate::trap::infrastructure::{configurator, low_level, reporter::StderrSink};
use spin::{Mutex, Once};

/// The global `Sentinel`, set at most once.
static SENTINEL: Once<Sentinel> = Once::new();

/// Serializes attach attempts; never touched from signal context.
static ATTACH_LOCK: Mutex<()> = Mutex::new(());

/// Attaches to the current process.
///
/// Order matters: line tables are loaded before anything is armed, and the
/// handlers are installed before `configurator::configure` arms the calling
/// thread. Between arming and publishing the sentinel this thread runs no
/// floating-point code, so no fault can miss it.
///
/// # Returns
/// The existing sentinel when called again with equal settings, after
/// arming the calling thread for its current mask, or
/// `AttachError::AlreadyAttached` when the settings differ.
pub fn attach(settings: Settings) -> Result<&'static Sentinel, AttachError> {
    let _guard = ATTACH_LOCK.lock();
    let control = low_level::HardwareFpControl;
    if let Some(sentinel) = SENTINEL.get() {
        if *sentinel.settings() != settings {
            return Err(AttachError::AlreadyAttached);
        }
        join(sentinel, &control);
        return Ok(sentinel);
    }
    if settings.disabled {
        return Err(AttachError::Disabled);
    }
    crate::logging::init(&settings.log_filter);

    // Line tables are built here, outside fault context, and never freed.
    let trappable = settings.exceptions.intersection(control.supported());
    let resolver: &'static dyn LocationResolver = if trappable.is_empty() {
        Box::leak(Box::new(Symbolizer::empty()))
    } else {
        Box::leak(Box::new(Symbolizer::load(settings.symbols, settings.symbol_max_bytes)))
    };

    low_level::install_handlers()?;
    let mask = configurator::configure(settings.exceptions, &control);
    let armed = mask.current();

    let summary = settings.summary;
    let sentinel = SENTINEL.call_once(|| Sentinel::new(settings, mask, resolver, Box::new(StderrSink)));

    if summary {
        register_summary();
    }
    tracing::info!(trapped = %armed, policy = ?sentinel.policy(), "fptrap attached");
    Ok(sentinel)
}

/// Arms the calling thread for an already published sentinel. Threads that
/// existed before the first attach start out with every trap masked.
fn join(sentinel: &Sentinel, control: &dyn FpControl) {
    let kinds = sentinel.mask();
    if control.armed() != kinds {
        configurator::arm(kinds, control);
    }
}

/// The attached sentinel after arming the calling thread, if any.
pub fn joined() -> Option<&'static Sentinel> {
    let sentinel = SENTINEL.get()?;
    join(sentinel, &low_level::HardwareFpControl);
    Some(sentinel)
}

/// The attached sentinel, if any.
pub fn sentinel() -> Option<&'static Sentinel> {
    SENTINEL.get()
}

/// Entry from the `SIGFPE` handler. `None` means the fault is not ours.
pub(super) fn dispatch_fault(snapshot: &FaultSnapshot) -> Option<Verdict> {
    SENTINEL.get().map(|sentinel| sentinel.on_fault(snapshot))
}

/// Kinds a thread may re-enable after a fault.
pub(super) fn current_mask() -> KindSet {
    SENTINEL.get().map_or(KindSet::EMPTY, Sentinel::mask)
}

fn register_summary() {
    extern "C" fn print_summary() {
        if let Some(sentinel) = SENTINEL.get() {
            let _ = crate::console::write_stderr(sentinel.summary().as_bytes());
        }
    }
    if unsafe { libc::atexit(print_summary) } != 0 {
        tracing::warn!("failed to register exit summary");
    }
}
