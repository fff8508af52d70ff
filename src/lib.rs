// fptrap/src/lib.rs

//! Floating-point exception trap reporter.
//!
//! Loaded with `LD_PRELOAD=libfptrap.so`, the library unmasks hardware traps
//! for the configured IEEE-754 exceptions (underflow by default) before the
//! program's `main` runs. Every trapped operation then prints one line such
//! as
//!
//! ```text
//! Warning: very small quantity (underflow) at dot_product.cu:18
//! ```
//!
//! to stderr and the program continues with the IEEE default result.
//! Configuration comes from `FPTRAP_*` environment variables, see [`config`].
//!
//! The load-time constructor is behind the `preload` feature, so programs
//! that link the crate and call [`attach`] themselves keep control over
//! their settings:
//!
//! ```text
//! cargo build --release --features preload
//! LD_PRELOAD=target/release/libfptrap.so ./dot_product
//! ```

// Library modules.
pub mod config;
pub mod console;
pub mod logging;
pub mod symbols;
pub mod trap;

pub use config::{Settings, SymbolScope};
pub use trap::{attach, attach_from_env, sentinel, AttachError, ExceptionKind, KindSet, Policy, Sentinel};

/// Runs at load time in every process the library is preloaded into.
#[cfg(all(feature = "preload", not(test)))]
#[ctor::ctor]
fn preload_attach() {
    match trap::attach_from_env() {
        Ok(_) | Err(AttachError::Disabled) => {}
        Err(error) => tracing::warn!(%error, "fptrap not attached"),
    }
}
