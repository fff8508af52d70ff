// fptrap/src/trap/infrastructure/reporter.rs

//! # Diagnostic Reporter
//!
//! Formats one event into a stack buffer and hands the finished line to a
//! [`DiagnosticSink`]. Nothing here allocates, so it runs inside the signal
//! handler.

use core::fmt::{self, Write};

use crate::console::{self, SigBuf};
use crate::trap::ds::{ExceptionEvent, ReportError, SourceLocation};
use crate::trap::infrastructure::di::traits::DiagnosticSink;

const REPORT_CAPACITY: usize = 512;

/// Emitted instead of a line that could not be formatted.
pub const FALLBACK_LINE: &[u8] = b"Warning: floating-point exception (report truncated)\n";

/// `Warning: <description> at <file>:<line>` or, unresolved,
/// `Warning: <description> at address 0x... (unresolved)`, newline included.
pub fn format_report<W: Write>(
    out: &mut W,
    event: &ExceptionEvent,
    location: Option<SourceLocation<'_>>,
) -> fmt::Result {
    write!(out, "Warning: {}", event.kind.description())?;
    match location {
        Some(location) => writeln!(out, " at {location}"),
        None => writeln!(out, " at address {:#x} (unresolved)", event.address),
    }
}

/// Reports one event. A line that does not fit is replaced by
/// [`FALLBACK_LINE`]; the error is still returned so it can be counted.
pub fn report(
    sink: &dyn DiagnosticSink,
    event: &ExceptionEvent,
    location: Option<SourceLocation<'_>>,
) -> Result<(), ReportError> {
    let mut line = SigBuf::<REPORT_CAPACITY>::new();
    if format_report(&mut line, event, location).is_err() {
        sink.emit(FALLBACK_LINE)?;
        return Err(ReportError::Truncated);
    }
    sink.emit(line.as_bytes())
}

/// Writes straight to file descriptor 2.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn emit(&self, line: &[u8]) -> Result<(), ReportError> {
        console::write_stderr(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trap::ds::ExceptionKind;
    use spin::Mutex;

    #[derive(Default)]
    struct Capture(Mutex<Vec<Vec<u8>>>);

    impl DiagnosticSink for Capture {
        fn emit(&self, line: &[u8]) -> Result<(), ReportError> {
            self.0.lock().push(line.to_vec());
            Ok(())
        }
    }

    impl Capture {
        fn lines(&self) -> Vec<String> {
            self.0
                .lock()
                .iter()
                .map(|l| String::from_utf8(l.clone()).unwrap())
                .collect()
        }
    }

    #[test]
    fn underflow_with_location() {
        let sink = Capture::default();
        let event = ExceptionEvent::new(ExceptionKind::Underflow, 0x4011c6, 7, 1);
        report(&sink, &event, Some(SourceLocation::new("dot_product.cu", 18))).unwrap();
        assert_eq!(
            sink.lines(),
            ["Warning: very small quantity (underflow) at dot_product.cu:18\n"]
        );
    }

    #[test]
    fn unresolved_prints_raw_address() {
        let sink = Capture::default();
        let event = ExceptionEvent::new(ExceptionKind::Overflow, 0x7f00_dead_beef, 7, 1);
        report(&sink, &event, None).unwrap();
        assert_eq!(
            sink.lines(),
            ["Warning: very large quantity (overflow) at address 0x7f00deadbeef (unresolved)\n"]
        );
    }

    #[test]
    fn unknown_kind_has_generic_message() {
        let mut line = SigBuf::<128>::new();
        let event = ExceptionEvent::new(ExceptionKind::Unknown, 0x10, 1, 1);
        format_report(&mut line, &event, None).unwrap();
        assert!(line
            .as_str()
            .starts_with("Warning: unrecognized floating-point exception at address 0x10"));
    }

    #[test]
    fn oversized_line_degrades_to_fallback() {
        let sink = Capture::default();
        let file = "x".repeat(REPORT_CAPACITY);
        let event = ExceptionEvent::new(ExceptionKind::Underflow, 0x10, 1, 1);
        let result = report(&sink, &event, Some(SourceLocation::new(&file, 1)));
        assert_eq!(result, Err(ReportError::Truncated));
        assert_eq!(sink.0.lock().as_slice(), [FALLBACK_LINE.to_vec()]);
    }
}
