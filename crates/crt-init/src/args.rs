//! Startup arguments and the C callback signatures the platform expects.

use libc::{c_char, c_int, c_void};

use crate::{InitError, Result};

/// An `.init_array` entry. GLIBC passes `(argc, argv, envp)`; other C
/// runtimes pass nothing and entries ignore the extra arguments.
pub type InitFn = unsafe extern "C" fn(c_int, *mut *mut c_char, *mut *mut c_char);

/// A C `main` taking `envp`.
pub type MainFn = unsafe extern "C" fn(c_int, *mut *mut c_char, *mut *mut c_char) -> c_int;

/// `(argc, argv)` as received from the process-startup orchestrator.
///
/// Passed through unmodified to the platform startup call and to every
/// initializer. `envp` is never part of this: the platform supplies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartupArgs {
    argc: c_int,
    argv: *mut *mut c_char,
}

// SAFETY: the pointers are only handed on to the platform startup call,
// which runs on the startup worker while the caller is blocked waiting.
unsafe impl Send for StartupArgs {}
unsafe impl Sync for StartupArgs {}

impl StartupArgs {
    /// Check the kernel's argument layout: `argc >= 0`, `argv` non-null and
    /// `argv[argc]` null.
    ///
    /// # Safety
    ///
    /// If `argv` is non-null it must point to at least `argc + 1` readable
    /// pointers.
    pub unsafe fn new(argc: c_int, argv: *mut *mut c_char) -> Result<Self> {
        if argc < 0 {
            return Err(InitError::InvalidArgs("argc is negative"));
        }
        if argv.is_null() {
            return Err(InitError::InvalidArgs("argv is null"));
        }
        if !(*argv.add(argc as usize)).is_null() {
            return Err(InitError::InvalidArgs("argv[argc] is not null"));
        }
        Ok(Self { argc, argv })
    }

    /// Skip the layout checks.
    ///
    /// # Safety
    ///
    /// Same contract as [`StartupArgs::new`], taken on trust.
    pub const unsafe fn new_unchecked(argc: c_int, argv: *mut *mut c_char) -> Self {
        Self { argc, argv }
    }

    pub fn argc(&self) -> c_int {
        self.argc
    }

    pub fn argv(&self) -> *mut *mut c_char {
        self.argv
    }

    /// Stack-bound marker for `__libc_start_main`. `argv` lives on the
    /// initial stack just above its end, which is close enough.
    pub fn stack_end(&self) -> *mut c_void {
        self.argv.cast()
    }
}
