// fptrap/src/console.rs

// Raw stderr output usable from a signal handler.
// Formatting goes through core::fmt into a stack buffer, output is a plain write(2).

use core::fmt;

use crate::trap::ReportError;

/// A fixed-capacity, stack-allocated line buffer.
///
/// Writes past the capacity keep what fits and report `fmt::Error`.
pub struct SigBuf<const N: usize> {
    buf: [u8; N],
    len: usize,
}

impl<const N: usize> SigBuf<N> {
    pub const fn new() -> Self {
        Self { buf: [0; N], len: 0 }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// The buffered text. Only complete UTF-8 is ever copied in, except when a
    /// write was cut short; the valid prefix is returned in that case.
    pub fn as_str(&self) -> &str {
        match core::str::from_utf8(self.as_bytes()) {
            Ok(s) => s,
            Err(e) => core::str::from_utf8(&self.buf[..e.valid_up_to()]).unwrap_or(""),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }
}

impl<const N: usize> Default for SigBuf<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Write for SigBuf<N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = N - self.len;
        let take = s.len().min(room);
        self.buf[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
        self.len += take;
        if take < s.len() {
            Err(fmt::Error)
        } else {
            Ok(())
        }
    }
}

/// Writes all of `bytes` to fd 2, retrying on `EINTR` and short writes.
/// Async-signal-safe: no allocation, no locks.
///
/// # Arguments
///
/// * `bytes` - The complete output, normally one diagnostic line.
///
/// # Returns
///
/// `ReportError::Write` with the `errno` of the first failing `write(2)`.
pub fn write_stderr(mut bytes: &[u8]) -> Result<(), ReportError> {
    while !bytes.is_empty() {
        let n = unsafe {
            libc::write(
                libc::STDERR_FILENO,
                bytes.as_ptr() as *const libc::c_void,
                bytes.len(),
            )
        };
        if n < 0 {
            let errno = errno();
            if errno == libc::EINTR {
                continue;
            }
            return Err(ReportError::Write(errno));
        }
        if n == 0 {
            return Err(ReportError::Write(0));
        }
        bytes = &bytes[n as usize..];
    }
    Ok(())
}

fn errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

/// Formats one line into a stack buffer and writes it to stderr.
/// Output that does not fit in 256 bytes is cut short.
#[macro_export]
macro_rules! raw_eprintln {
    ($($arg:tt)*) => {{
        use ::core::fmt::Write as _;
        let mut line = $crate::console::SigBuf::<256>::new();
        let _ = ::core::write!(line, $($arg)*);
        let _ = line.write_str("\n");
        let _ = $crate::console::write_stderr(line.as_bytes());
    }};
}
