//! Bootstrap diagnostics.
//!
//! The hand-off runs before any tracing subscriber is installed, and the
//! fatal paths run with the C runtime half initialized. Everything here
//! formats on the stack and writes to fd 2 with a raw `write(2)`.

use std::fmt;

/// Write a formatted line to stderr without touching the heap.
///
/// # Usage:
/// ```ignore
/// bootstrap_diag!("handing off to the C runtime (argc={})", argc);
/// ```
#[macro_export]
macro_rules! bootstrap_diag {
    ($($arg:tt)*) => {
        $crate::macros::write_diag(format_args!($($arg)*))
    };
}

/// Zero-allocation `fmt::Write` sink over a caller-provided buffer.
/// Output past the end of the buffer is dropped.
pub struct StackWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> StackWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn as_str(&self) -> &str {
        let written = &self.buf[..self.pos];
        match std::str::from_utf8(written) {
            Ok(s) => s,
            // Truncation can split a multi-byte char.
            Err(e) => std::str::from_utf8(&written[..e.valid_up_to()]).unwrap_or(""),
        }
    }
}

impl<'a> fmt::Write for StackWriter<'a> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let bytes = s.as_bytes();
        let remaining = self.buf.len() - self.pos;
        let to_copy = std::cmp::min(bytes.len(), remaining);
        self.buf[self.pos..self.pos + to_copy].copy_from_slice(&bytes[..to_copy]);
        self.pos += to_copy;
        Ok(())
    }
}

#[doc(hidden)]
pub fn write_diag(args: fmt::Arguments<'_>) {
    use fmt::Write;

    let mut buf = [0u8; 512];
    let mut writer = StackWriter::new(&mut buf);
    let pid = unsafe { libc::getpid() };
    let _ = write!(writer, "[crt-init][{}] ", pid);
    let _ = writer.write_fmt(args);
    let _ = writeln!(writer);

    let msg = writer.as_str();
    unsafe { libc::write(2, msg.as_ptr() as *const libc::c_void, msg.len()) };
}

/// Report a violated bootstrap precondition and abort the process.
#[cold]
#[cfg_attr(not(all(target_os = "linux", feature = "native")), allow(dead_code))]
pub(crate) fn bootstrap_abort(args: fmt::Arguments<'_>) -> ! {
    write_diag(args);
    unsafe { libc::abort() }
}
