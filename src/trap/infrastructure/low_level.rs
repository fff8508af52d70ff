// fptrap/src/trap/infrastructure/low_level.rs

//! # Low-Level Floating-Point and Signal Control
//!
//! Direct control over the SSE control/status register (MXCSR), the saved
//! machine context of a signal, and installation of the `SIGFPE`/`SIGTRAP`
//! entry points.
//!
//! ## Resumption
//!
//! SIMD floating-point exceptions are faults: the saved instruction pointer
//! still points at the faulting instruction. To let it complete, the
//! `SIGFPE` entry masks every trap in the saved MXCSR and sets the trap flag
//! in the saved EFLAGS. The instruction then re-executes with IEEE default
//! semantics, the CPU single-steps, and the `SIGTRAP` entry restores the
//! trap-enable bits and clears the trap flag.
//!
//! Status flags belong to the host program. The only flag touched is the
//! one the trap itself set, which is cleared before re-execution so the
//! masked instruction leaves behind exactly the flags it would have set
//! without the library.

use crate::trap::ds::{ExceptionKind, FaultSnapshot, KindSet};

pub use self::platform::*;

/// Kernel thread id of the calling thread. Async-signal-safe.
#[cfg(target_os = "linux")]
pub fn thread_id() -> i32 {
    unsafe { libc::syscall(libc::SYS_gettid) as i32 }
}

#[cfg(not(target_os = "linux"))]
pub fn thread_id() -> i32 {
    0
}

/// Terminates the process without running exit handlers. Async-signal-safe.
pub fn abort_process(status: i32) -> ! {
    unsafe { libc::_exit(status) }
}

// si_code values for SIGFPE.
const FPE_INTDIV: i32 = 1;
const FPE_INTOVF: i32 = 2;
const FPE_FLTDIV: i32 = 3;
const FPE_FLTOVF: i32 = 4;
const FPE_FLTUND: i32 = 5;
const FPE_FLTRES: i32 = 6;
const FPE_FLTINV: i32 = 7;

/// The kind named by a `SIGFPE` si_code, if any.
pub fn signal_kind(code: i32) -> Option<ExceptionKind> {
    match code {
        FPE_FLTINV => Some(ExceptionKind::Invalid),
        FPE_FLTDIV => Some(ExceptionKind::DivideByZero),
        FPE_FLTOVF => Some(ExceptionKind::Overflow),
        FPE_FLTUND => Some(ExceptionKind::Underflow),
        FPE_FLTRES => Some(ExceptionKind::Inexact),
        _ => None,
    }
}

/// Integer division faults also arrive as `SIGFPE` and are not ours.
pub fn is_integer_fault(code: i32) -> bool {
    code == FPE_INTDIV || code == FPE_INTOVF
}

/// MXCSR bit layout: status flags in bits 0-5, the matching mask bits 7-12.
pub mod mxcsr {
    use super::{ExceptionKind, KindSet};

    /// IE, DE, ZE, OE, UE, PE.
    pub const FLAG_BITS: u32 = 0x3F;
    pub const MASK_SHIFT: u32 = 7;
    pub const MASK_BITS: u32 = FLAG_BITS << MASK_SHIFT;

    /// Power-on value: everything masked, no flags.
    pub const DEFAULT: u32 = 0x1F80;

    pub const fn flag(kind: ExceptionKind) -> u32 {
        match kind {
            ExceptionKind::Invalid => 1 << 0,
            ExceptionKind::DivideByZero => 1 << 2,
            ExceptionKind::Overflow => 1 << 3,
            ExceptionKind::Underflow => 1 << 4,
            ExceptionKind::Inexact => 1 << 5,
            ExceptionKind::Unknown => 0,
        }
    }

    pub fn flags_of(kinds: KindSet) -> u32 {
        kinds.iter().fold(0, |acc, kind| acc | flag(kind))
    }

    /// Kinds whose bit is set in a flag-layout value.
    pub fn kinds_in(flags: u32) -> KindSet {
        ExceptionKind::ALL
            .into_iter()
            .filter(|kind| flags & flag(*kind) != 0)
            .collect()
    }

    /// Kinds whose status flag is set.
    pub fn raised(csr: u32) -> KindSet {
        kinds_in(csr & FLAG_BITS)
    }

    /// Kinds whose trap is enabled (mask bit clear).
    pub fn trapped(csr: u32) -> KindSet {
        kinds_in(!(csr >> MASK_SHIFT) & FLAG_BITS)
    }

    /// `csr` with traps enabled for exactly `kinds`. Status flags are left
    /// alone: unmasking a kind whose flag is already set does not fault on SSE.
    pub fn armed(csr: u32, kinds: KindSet) -> u32 {
        (csr | MASK_BITS) & !(flags_of(kinds) << MASK_SHIFT)
    }

    /// `csr` with every trap masked and the flags in `clear` reset.
    pub fn disarmed(csr: u32, clear: u32) -> u32 {
        (csr | MASK_BITS) & !(clear & FLAG_BITS)
    }
}

impl FaultSnapshot {
    /// Builds a snapshot from a saved MXCSR value.
    pub fn from_mxcsr(address: usize, csr: u32, code: i32) -> Self {
        FaultSnapshot::new(address, mxcsr::raised(csr), mxcsr::trapped(csr))
            .with_signal_kind(signal_kind(code))
    }
}

#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
mod platform {
    use core::arch::asm;
    use core::cell::Cell;
    use core::ptr;
    use std::io;

    use super::{is_integer_fault, mxcsr};
    use crate::trap::ds::{AttachError, ConfigError, FaultSnapshot, KindSet, Verdict};
    use crate::trap::infrastructure::di::{self, traits::FpControl};
    use crate::trap::infrastructure::interceptor;

    const TRAP_FLAG: libc::greg_t = 0x100;

    thread_local! {
        // Kinds to re-enable at the next single-step trap on this thread.
        static PENDING_REARM: Cell<Option<KindSet>> = const { Cell::new(None) };
        // Status flags left set when this thread was last re-armed.
        static STICKY_FLAGS: Cell<u32> = const { Cell::new(0) };
    }

    static PREVIOUS_SIGFPE: spin::Once<libc::sigaction> = spin::Once::new();
    static PREVIOUS_SIGTRAP: spin::Once<libc::sigaction> = spin::Once::new();

    pub fn read_mxcsr() -> u32 {
        let mut csr: u32 = 0;
        unsafe {
            asm!("stmxcsr [{}]", in(reg) &mut csr as *mut u32, options(nostack, preserves_flags));
        }
        csr
    }

    /// # Safety
    /// Changes the floating-point environment of the calling thread.
    pub unsafe fn write_mxcsr(csr: u32) {
        asm!("ldmxcsr [{}]", in(reg) &csr as *const u32, options(nostack, readonly, preserves_flags));
    }

    /// SSE trap-enable control for the calling thread.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct HardwareFpControl;

    impl FpControl for HardwareFpControl {
        fn supported(&self) -> KindSet {
            KindSet::ALL
        }

        fn arm(&self, kinds: KindSet) -> Result<(), ConfigError> {
            unsafe { write_mxcsr(mxcsr::armed(read_mxcsr(), kinds)) };
            if self.armed() != kinds {
                return Err(ConfigError::UnsupportedPlatform);
            }
            Ok(())
        }

        fn armed(&self) -> KindSet {
            mxcsr::trapped(read_mxcsr())
        }
    }

    /// Accessor for the machine context saved by the kernel for a signal.
    pub struct FaultContext<'a> {
        uc: &'a mut libc::ucontext_t,
    }

    impl<'a> FaultContext<'a> {
        /// # Safety
        /// `raw` must be the third argument of an `SA_SIGINFO` handler.
        pub unsafe fn from_raw(raw: *mut libc::c_void) -> Option<Self> {
            let uc = (raw as *mut libc::ucontext_t).as_mut()?;
            Some(Self { uc })
        }

        pub fn instruction_pointer(&self) -> usize {
            self.uc.uc_mcontext.gregs[libc::REG_RIP as usize] as usize
        }

        /// Saved MXCSR, `None` if the kernel saved no FPU state.
        pub fn mxcsr(&self) -> Option<u32> {
            let fpregs = self.uc.uc_mcontext.fpregs;
            if fpregs.is_null() {
                return None;
            }
            Some(unsafe { (*fpregs).mxcsr })
        }

        /// Replaces the saved MXCSR; restored by the kernel on return.
        pub fn set_mxcsr(&mut self, csr: u32) -> bool {
            let fpregs = self.uc.uc_mcontext.fpregs;
            if fpregs.is_null() {
                return false;
            }
            unsafe { (*fpregs).mxcsr = csr };
            true
        }

        pub fn set_single_step(&mut self, enabled: bool) {
            let eflags = &mut self.uc.uc_mcontext.gregs[libc::REG_EFL as usize];
            if enabled {
                *eflags |= TRAP_FLAG;
            } else {
                *eflags &= !TRAP_FLAG;
            }
        }

        pub fn snapshot(&self, code: i32, stale: u32) -> FaultSnapshot {
            let csr = self.mxcsr().unwrap_or(mxcsr::DEFAULT);
            FaultSnapshot::from_mxcsr(self.instruction_pointer(), csr, code)
                .with_stale(mxcsr::kinds_in(stale))
        }
    }

    /// Installs the `SIGFPE` and `SIGTRAP` entry points, remembering the
    /// previous dispositions for chaining.
    pub fn install_handlers() -> Result<(), AttachError> {
        install(libc::SIGFPE, "SIGFPE", on_sigfpe, &PREVIOUS_SIGFPE)?;
        install(libc::SIGTRAP, "SIGTRAP", on_sigtrap, &PREVIOUS_SIGTRAP)?;
        Ok(())
    }

    fn install(
        signo: libc::c_int,
        name: &'static str,
        handler: extern "C" fn(libc::c_int, *mut libc::siginfo_t, *mut libc::c_void),
        previous: &'static spin::Once<libc::sigaction>,
    ) -> Result<(), AttachError> {
        unsafe {
            let mut action: libc::sigaction = core::mem::zeroed();
            action.sa_sigaction = handler as usize;
            action.sa_flags = libc::SA_SIGINFO | libc::SA_ONSTACK | libc::SA_RESTART;
            libc::sigemptyset(&mut action.sa_mask);

            let mut old: libc::sigaction = core::mem::zeroed();
            if libc::sigaction(signo, &action, &mut old) != 0 {
                return Err(AttachError::SignalInstall {
                    signal: name,
                    source: io::Error::last_os_error(),
                });
            }
            // Keep the disposition that was there before us, even on re-install.
            previous.call_once(|| old);
        }
        Ok(())
    }

    extern "C" fn on_sigfpe(signo: libc::c_int, info: *mut libc::siginfo_t, raw: *mut libc::c_void) {
        let code = unsafe { info.as_ref().map_or(0, |info| info.si_code) };
        let context = unsafe { FaultContext::from_raw(raw) };
        let (Some(mut context), false) = (context, is_integer_fault(code)) else {
            unsafe { chain(&PREVIOUS_SIGFPE, signo, info, raw) };
            return;
        };

        let stale = STICKY_FLAGS.with(Cell::get);
        let snapshot = context.snapshot(code, stale);
        match di::dispatch_fault(&snapshot) {
            Some(Verdict::Resume { rearm }) => {
                let Some(csr) = context.mxcsr() else {
                    crate::raw_eprintln!("fptrap: no saved FPU state, cannot resume");
                    super::abort_process(crate::config::DEFAULT_ABORT_STATUS);
                };
                // Drop only the flag this trap set; re-execution sets it
                // again if the masked result calls for it.
                let own = mxcsr::flag(interceptor::classify(&snapshot)) & !stale;
                context.set_mxcsr(mxcsr::disarmed(csr, own));
                context.set_single_step(true);
                PENDING_REARM.with(|pending| pending.set(Some(rearm)));
            }
            Some(Verdict::Abort { status }) => super::abort_process(status),
            None => unsafe { chain(&PREVIOUS_SIGFPE, signo, info, raw) },
        }
    }

    extern "C" fn on_sigtrap(signo: libc::c_int, info: *mut libc::siginfo_t, raw: *mut libc::c_void) {
        if let Some(rearm) = PENDING_REARM.with(|pending| pending.take()) {
            if let Some(mut context) = unsafe { FaultContext::from_raw(raw) } {
                // Another thread may have narrowed the mask since the fault.
                let allowed = rearm.intersection(di::current_mask());
                if let Some(csr) = context.mxcsr() {
                    context.set_mxcsr(mxcsr::armed(csr, allowed));
                    STICKY_FLAGS.with(|sticky| sticky.set(csr & mxcsr::FLAG_BITS));
                }
                context.set_single_step(false);
            }
            return;
        }
        unsafe { chain(&PREVIOUS_SIGTRAP, signo, info, raw) };
    }

    /// Forwards a signal that is not ours to whatever was installed before.
    unsafe fn chain(
        previous: &spin::Once<libc::sigaction>,
        signo: libc::c_int,
        info: *mut libc::siginfo_t,
        raw: *mut libc::c_void,
    ) {
        let Some(prev) = previous.get() else {
            return;
        };
        match prev.sa_sigaction {
            libc::SIG_IGN => {}
            libc::SIG_DFL => {
                // Faults re-execute and hit the default action; traps have
                // already retired, so they are raised again.
                libc::sigaction(signo, prev, ptr::null_mut());
                if signo == libc::SIGTRAP {
                    libc::raise(signo);
                }
            }
            handler if prev.sa_flags & libc::SA_SIGINFO != 0 => {
                let handler: extern "C" fn(libc::c_int, *mut libc::siginfo_t, *mut libc::c_void) =
                    core::mem::transmute(handler);
                handler(signo, info, raw);
            }
            handler => {
                let handler: extern "C" fn(libc::c_int) = core::mem::transmute(handler);
                handler(signo);
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::trap::ds::ExceptionKind;

        #[test]
        fn arm_round_trips_through_hardware() {
            // Runs on its own thread so the test harness keeps default masks.
            std::thread::spawn(|| {
                let control = HardwareFpControl;
                let kinds = KindSet::EMPTY
                    .with(ExceptionKind::Underflow)
                    .with(ExceptionKind::Overflow);
                control.arm(kinds).unwrap();
                assert_eq!(control.armed(), kinds);
                control.arm(KindSet::EMPTY).unwrap();
                assert_eq!(control.armed(), KindSet::EMPTY);
                assert_eq!(read_mxcsr() & mxcsr::MASK_BITS, mxcsr::MASK_BITS);
            })
            .join()
            .unwrap();
        }

        #[test]
        fn arming_keeps_host_status_flags() {
            std::thread::spawn(|| {
                // A masked inexact division leaves PE set.
                let third = std::hint::black_box(1.0f64) / std::hint::black_box(3.0f64);
                assert!(third > 0.0);
                let inexact = mxcsr::flag(ExceptionKind::Inexact);
                assert_ne!(read_mxcsr() & inexact, 0);

                let control = HardwareFpControl;
                control.arm(KindSet::DEFAULT).unwrap();
                assert_ne!(read_mxcsr() & inexact, 0);
                control.arm(KindSet::EMPTY).unwrap();
                assert_ne!(read_mxcsr() & inexact, 0);
            })
            .join()
            .unwrap();
        }
    }
}

#[cfg(not(all(target_os = "linux", target_arch = "x86_64")))]
mod platform {
    use crate::trap::ds::{AttachError, ConfigError, KindSet};
    use crate::trap::infrastructure::di::traits::FpControl;

    /// Trap control stub for platforms without supported trap-enable bits.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct HardwareFpControl;

    impl FpControl for HardwareFpControl {
        fn supported(&self) -> KindSet {
            KindSet::EMPTY
        }

        fn arm(&self, kinds: KindSet) -> Result<(), ConfigError> {
            if kinds.is_empty() {
                Ok(())
            } else {
                Err(ConfigError::UnsupportedPlatform)
            }
        }

        fn armed(&self) -> KindSet {
            KindSet::EMPTY
        }
    }

    /// Nothing can fault, so nothing is intercepted.
    pub fn install_handlers() -> Result<(), AttachError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mxcsr_classification() {
        // UE and PE raised, UM unmasked.
        let csr = (mxcsr::DEFAULT & !(1 << 11)) | 0b11_0000;
        assert_eq!(
            mxcsr::raised(csr),
            KindSet::EMPTY
                .with(ExceptionKind::Underflow)
                .with(ExceptionKind::Inexact)
        );
        assert_eq!(mxcsr::trapped(csr), ExceptionKind::Underflow.bit());
        assert_eq!(mxcsr::trapped(mxcsr::DEFAULT), KindSet::EMPTY);
    }

    #[test]
    fn arming_changes_mask_bits_only() {
        let csr = mxcsr::armed(mxcsr::DEFAULT, ExceptionKind::Underflow.bit());
        assert_eq!(csr, mxcsr::DEFAULT & !(1 << 11));
        // Host flags (PE and IE here) survive arming and disarming.
        let flagged = mxcsr::armed(mxcsr::DEFAULT | 0x21, ExceptionKind::Underflow.bit());
        assert_eq!(flagged & mxcsr::FLAG_BITS, 0x21);
        assert_eq!(mxcsr::disarmed(flagged, 0), mxcsr::DEFAULT | 0x21);
        // The denormal-operand trap is never enabled.
        assert_ne!(mxcsr::armed(0, KindSet::ALL) & (1 << 8), 0);
    }

    #[test]
    fn disarming_clears_only_the_requested_flag() {
        let csr = mxcsr::armed(mxcsr::DEFAULT, KindSet::DEFAULT) | 0x30;
        let own = mxcsr::flag(ExceptionKind::Underflow);
        assert_eq!(mxcsr::disarmed(csr, own), mxcsr::DEFAULT | 0x20);
    }

    #[test]
    fn signal_codes() {
        assert_eq!(signal_kind(FPE_FLTUND), Some(ExceptionKind::Underflow));
        assert_eq!(signal_kind(FPE_FLTINV), Some(ExceptionKind::Invalid));
        assert_eq!(signal_kind(FPE_INTDIV), None);
        assert!(is_integer_fault(FPE_INTDIV));
        assert!(!is_integer_fault(FPE_FLTDIV));
    }

    #[test]
    fn snapshot_from_saved_state() {
        let csr = mxcsr::armed(mxcsr::DEFAULT, KindSet::ALL) | mxcsr::flag(ExceptionKind::Overflow);
        let snapshot = FaultSnapshot::from_mxcsr(0x4000, csr, FPE_FLTOVF);
        assert_eq!(snapshot.address, 0x4000);
        assert_eq!(snapshot.raised, ExceptionKind::Overflow.bit());
        assert_eq!(snapshot.trapped, KindSet::ALL);
        assert_eq!(snapshot.signal_kind, Some(ExceptionKind::Overflow));
    }
}
