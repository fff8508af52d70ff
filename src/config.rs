// fptrap/src/config.rs

//! Environment configuration, read once at attach time.
//!
//! Every variable is optional. A value that fails to parse is reported as a
//! [`ConfigError`] and that one setting keeps its default.

use crate::trap::{ConfigError, ExceptionKind, KindSet, Policy};

pub const ENV_EXCEPTIONS: &str = "FPTRAP_EXCEPTIONS";
pub const ENV_ACTION: &str = "FPTRAP_ACTION";
pub const ENV_THRESHOLD: &str = "FPTRAP_THRESHOLD";
pub const ENV_ABORT_STATUS: &str = "FPTRAP_ABORT_STATUS";
pub const ENV_SYMBOLS: &str = "FPTRAP_SYMBOLS";
pub const ENV_SYMBOL_MAX_BYTES: &str = "FPTRAP_SYMBOL_MAX_BYTES";
pub const ENV_SUMMARY: &str = "FPTRAP_SUMMARY";
pub const ENV_LOG: &str = "FPTRAP_LOG";
pub const ENV_DISABLE: &str = "FPTRAP_DISABLE";

/// Exit status used by the abort action unless overridden.
pub const DEFAULT_ABORT_STATUS: i32 = 86;

/// Object files larger than this are not indexed for line information.
pub const DEFAULT_SYMBOL_MAX_BYTES: u64 = 256 * 1024 * 1024;

/// Which loaded modules get their line tables indexed at attach time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolScope {
    /// Every module mapped when the library attaches.
    All,
    /// Only the main executable.
    Main,
    /// No symbolication; every report shows a raw address.
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Kinds to trap.
    pub exceptions: KindSet,
    pub policy: Policy,
    pub abort_status: i32,
    pub symbols: SymbolScope,
    pub symbol_max_bytes: u64,
    /// Print an exit-time summary of everything reported.
    pub summary: bool,
    /// `tracing` filter directive for the library's own logs.
    pub log_filter: String,
    pub disabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            exceptions: KindSet::DEFAULT,
            policy: Policy::Continue,
            abort_status: DEFAULT_ABORT_STATUS,
            symbols: SymbolScope::All,
            symbol_max_bytes: DEFAULT_SYMBOL_MAX_BYTES,
            summary: false,
            log_filter: "warn".to_string(),
            disabled: false,
        }
    }
}

impl Settings {
    /// Reads the process environment.
    pub fn from_env() -> (Self, Vec<ConfigError>) {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds settings from an arbitrary variable lookup.
    ///
    /// # Arguments
    ///
    /// * `lookup` - Returns the value of a variable by name, or `None` if unset.
    ///
    /// # Returns
    ///
    /// The settings, and one error per variable that failed to parse.
    pub fn from_lookup<F>(lookup: F) -> (Self, Vec<ConfigError>)
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();
        let mut errors = Vec::new();

        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(value) = get(ENV_EXCEPTIONS) {
            match parse_kinds(ENV_EXCEPTIONS, &value) {
                Ok(kinds) => settings.exceptions = kinds,
                Err(e) => errors.push(e),
            }
        }

        let threshold = match get(ENV_THRESHOLD) {
            Some(value) => match parse_number(ENV_THRESHOLD, &value) {
                Ok(0) => {
                    errors.push(ConfigError::OutOfRange {
                        var: ENV_THRESHOLD,
                        value: 0,
                    });
                    None
                }
                Ok(n) => Some(n),
                Err(e) => {
                    errors.push(e);
                    None
                }
            },
            None => None,
        };

        if let Some(value) = get(ENV_ACTION) {
            match value.to_ascii_lowercase().as_str() {
                "continue" => settings.policy = Policy::Continue,
                "abort" => settings.policy = Policy::Abort,
                "disable" => {
                    settings.policy = Policy::Disable {
                        threshold: threshold.unwrap_or(1),
                    }
                }
                _ => errors.push(ConfigError::UnknownAction {
                    var: ENV_ACTION,
                    value,
                }),
            }
        }

        if let Some(value) = get(ENV_ABORT_STATUS) {
            match parse_number(ENV_ABORT_STATUS, &value) {
                Ok(status @ 1..=255) => settings.abort_status = status as i32,
                Ok(status) => errors.push(ConfigError::OutOfRange {
                    var: ENV_ABORT_STATUS,
                    value: status,
                }),
                Err(e) => errors.push(e),
            }
        }

        if let Some(value) = get(ENV_SYMBOLS) {
            match value.to_ascii_lowercase().as_str() {
                "all" => settings.symbols = SymbolScope::All,
                "main" => settings.symbols = SymbolScope::Main,
                "none" => settings.symbols = SymbolScope::None,
                _ => errors.push(ConfigError::UnknownScope {
                    var: ENV_SYMBOLS,
                    value,
                }),
            }
        }

        if let Some(value) = get(ENV_SYMBOL_MAX_BYTES) {
            match parse_number(ENV_SYMBOL_MAX_BYTES, &value) {
                Ok(bytes) => settings.symbol_max_bytes = bytes,
                Err(e) => errors.push(e),
            }
        }

        settings.summary = get(ENV_SUMMARY).is_some_and(|v| is_truthy(&v));
        settings.disabled = get(ENV_DISABLE).is_some_and(|v| is_truthy(&v));

        if let Some(filter) = get(ENV_LOG) {
            settings.log_filter = filter;
        }

        (settings, errors)
    }
}

/// Parses a comma-separated kind list, `all` or `none`.
///
/// # Arguments
///
/// * `var` - Variable name, carried into the error.
/// * `value` - The raw value.
pub fn parse_kinds(var: &'static str, value: &str) -> Result<KindSet, ConfigError> {
    let mut kinds = KindSet::EMPTY;
    for token in value.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let token = token.to_ascii_lowercase();
        kinds = match token.as_str() {
            "all" => KindSet::ALL,
            "none" => KindSet::EMPTY,
            "underflow" => kinds.with(ExceptionKind::Underflow),
            "overflow" => kinds.with(ExceptionKind::Overflow),
            "invalid" => kinds.with(ExceptionKind::Invalid),
            "divbyzero" | "divide-by-zero" | "div" => kinds.with(ExceptionKind::DivideByZero),
            "inexact" => kinds.with(ExceptionKind::Inexact),
            _ => return Err(ConfigError::UnknownKind { var, value: token }),
        };
    }
    Ok(kinds)
}

fn parse_number(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidNumber {
        var,
        value: value.to_string(),
    })
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
