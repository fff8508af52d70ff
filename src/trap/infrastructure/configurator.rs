// fptrap/src/trap/infrastructure/configurator.rs

//! # Environment Configurator
//!
//! Programs the hardware trap-enable bits for the requested kinds. Kinds the
//! platform cannot trap are dropped with a warning; a failure to program the
//! hardware leaves every trap masked. Neither case is fatal.

use crate::trap::ds::{ConfigError, KindSet};
use crate::trap::infrastructure::di::traits::FpControl;
use crate::trap::infrastructure::resumption::ExceptionMask;

/// Narrows `requested` to what `control` supports, warning once per dropped kind.
pub fn plan(requested: KindSet, control: &dyn FpControl) -> KindSet {
    let supported = control.supported();
    for kind in requested.difference(supported).iter() {
        tracing::warn!(error = %ConfigError::UnsupportedKind(kind), "exception stays untrapped");
    }
    requested.intersection(supported)
}

/// Enables traps for exactly `kinds` on the calling thread and returns what
/// ended up armed.
pub fn arm(kinds: KindSet, control: &dyn FpControl) -> KindSet {
    match control.arm(kinds) {
        Ok(()) => {
            tracing::debug!(%kinds, "floating-point traps armed");
            kinds
        }
        Err(e) => {
            tracing::warn!(error = %e, requested = %kinds, "floating-point trapping disabled");
            if let Err(e) = control.arm(KindSet::EMPTY) {
                tracing::warn!(error = %e, "failed to mask floating-point traps");
            }
            KindSet::EMPTY
        }
    }
}

/// `plan` followed by `arm`.
pub fn configure(requested: KindSet, control: &dyn FpControl) -> ExceptionMask {
    ExceptionMask::new(arm(plan(requested, control), control))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trap::ds::ExceptionKind;
    use core::sync::atomic::{AtomicU8, Ordering};

    struct FakeControl {
        supported: KindSet,
        armed: AtomicU8,
        broken: bool,
    }

    impl FakeControl {
        fn new(supported: KindSet) -> Self {
            Self {
                supported,
                armed: AtomicU8::new(0),
                broken: false,
            }
        }
    }

    impl FpControl for FakeControl {
        fn supported(&self) -> KindSet {
            self.supported
        }

        fn arm(&self, kinds: KindSet) -> Result<(), ConfigError> {
            if self.broken && !kinds.is_empty() {
                return Err(ConfigError::UnsupportedPlatform);
            }
            self.armed.store(kinds.bits(), Ordering::Relaxed);
            Ok(())
        }

        fn armed(&self) -> KindSet {
            KindSet::from_bits(self.armed.load(Ordering::Relaxed))
        }
    }

    #[test]
    fn arms_exactly_the_requested_kinds() {
        let control = FakeControl::new(KindSet::ALL);
        let requested = KindSet::DEFAULT.with(ExceptionKind::Overflow);
        let mask = configure(requested, &control);
        assert_eq!(mask.current(), requested);
        assert_eq!(control.armed(), requested);
    }

    #[test]
    fn unsupported_kinds_stay_masked() {
        let control = FakeControl::new(KindSet::DEFAULT);
        let mask = configure(KindSet::ALL, &control);
        assert_eq!(mask.current(), KindSet::DEFAULT);
        assert_eq!(control.armed(), KindSet::DEFAULT);
    }

    #[test]
    fn arm_failure_degrades_to_nothing() {
        let control = FakeControl {
            broken: true,
            ..FakeControl::new(KindSet::ALL)
        };
        let mask = configure(KindSet::DEFAULT, &control);
        assert_eq!(mask.current(), KindSet::EMPTY);
        assert_eq!(control.armed(), KindSet::EMPTY);
    }
}
