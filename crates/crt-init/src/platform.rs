//! The platform startup seam.
//!
//! A [`StartupPlatform`] is whatever plays the role of `__libc_start_main`:
//! it runs the C runtime's early setup, runs static initializers (either by
//! calling the init callback it is handed or by walking the init array
//! itself), then calls the program entry and exits. The native
//! implementation lives in `native`; tests substitute a simulated one.

use libc::{c_char, c_int};

use crate::args::StartupArgs;
use crt_init_config::ConventionChoice;

/// Callbacks handed to the platform startup call.
///
/// `main` never returns in practice: the interceptor's entry callback parks
/// the startup worker once it has resumed the caller.
pub struct StartupHooks<'a> {
    pub main: &'a (dyn Fn(c_int, *mut *mut c_char, *mut *mut c_char) -> c_int + Sync),
    pub init: &'a (dyn Fn(c_int, *mut *mut c_char, *mut *mut c_char) + Sync),
}

pub trait StartupPlatform: Send + Sync + 'static {
    /// How this platform treats the init callback.
    fn convention(&self) -> InitConvention {
        InitConvention::for_target()
    }

    /// Run the platform startup sequence. Like `__libc_start_main`, this
    /// does not return: it ends in the platform's `exit` unless `main`
    /// diverges first.
    ///
    /// # Safety
    ///
    /// `args` must describe a valid argument vector, and the hooks must stay
    /// alive for as long as the platform may call them.
    unsafe fn start_main(&self, args: StartupArgs, hooks: &StartupHooks<'_>) -> !;
}

/// Which side walks the initializer table during startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitConvention {
    /// The platform calls the init callback it is handed, exactly once.
    /// Dynamically linked glibc: a non-null `init` takes the legacy path.
    CallerSupplied,
    /// The platform ignores the callback and runs `.init_array` itself.
    /// musl, and statically linked glibc.
    PlatformRuns,
}

impl InitConvention {
    pub fn for_target() -> Self {
        if cfg!(all(target_env = "gnu", not(target_feature = "crt-static"))) {
            InitConvention::CallerSupplied
        } else {
            InitConvention::PlatformRuns
        }
    }

    /// Apply a configured choice over the platform's own default.
    pub fn resolve(choice: ConventionChoice, platform_default: Self) -> Self {
        match choice {
            ConventionChoice::Auto => platform_default,
            ConventionChoice::CallerSupplied => InitConvention::CallerSupplied,
            ConventionChoice::PlatformRuns => InitConvention::PlatformRuns,
        }
    }

    /// How many times the init callback must have run by the time the entry
    /// callback fires. Anything else means initializers were skipped or ran
    /// twice.
    pub fn expected_passes(self) -> usize {
        match self {
            InitConvention::CallerSupplied => 1,
            InitConvention::PlatformRuns => 0,
        }
    }
}
