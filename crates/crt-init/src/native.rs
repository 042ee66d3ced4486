//! Native hand-off through the platform's `__libc_start_main`.
//!
//! `__libc_start_main` takes plain C function pointers and no user data, so
//! the Rust hooks for the one active hand-off are published in
//! `ACTIVE_HOOKS` and reached through the two trampolines below.
//!
//! Exposes `mustang_initialize_c_runtime` for the process-startup
//! orchestrator to call exactly once, before `main`, and registers the
//! exit-time stdio flush alongside it.

use std::ptr::null_mut;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};

use libc::{c_char, c_int, c_void};

use crate::args::{InitFn, MainFn, StartupArgs};
use crate::cleanup::flush_all_streams;
use crate::initializers::InitializerRange;
use crate::interceptor::Interceptor;
use crate::macros::bootstrap_abort;
use crate::platform::{StartupHooks, StartupPlatform};

extern "C" {
    /// <https://refspecs.linuxbase.org/LSB_5.0.0/LSB-Core-generic/LSB-Core-generic/baselib---libc-start-main-.html>
    ///
    /// With the GLIBC extension of passing `argc`, `argv` and `envp` to the
    /// init callback. musl declares no `stack_end`; the extra argument is
    /// ignored there.
    fn __libc_start_main(
        main: MainFn,
        argc: c_int,
        ubp_av: *mut *mut c_char,
        init: Option<InitFn>,
        fini: Option<unsafe extern "C" fn()>,
        rtld_fini: Option<unsafe extern "C" fn()>,
        stack_end: *mut c_void,
    ) -> !;
}

/// Priority-0 finalizer: runs after every other `.fini_array` entry.
///
/// Must stay in sync with `cleanup::FINI_CLEANUP_SECTION`. Read from
/// `mustang_initialize_c_runtime` so an archive link that pulls in the
/// export also pulls in this slot.
#[link_section = ".fini_array.00000"]
#[used]
pub(crate) static REGISTER_CLEANUP: extern "C" fn() = flush_all_streams;

static ACTIVE_HOOKS: AtomicPtr<StartupHooks<'static>> = AtomicPtr::new(null_mut());
static HANDED_OFF: AtomicBool = AtomicBool::new(false);

/// The platform C runtime's own startup entry point.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibcStartMain;

impl StartupPlatform for LibcStartMain {
    unsafe fn start_main(&self, args: StartupArgs, hooks: &StartupHooks<'_>) -> ! {
        // The hooks live on this thread's stack, which is parked, never
        // unwound, once the entry callback runs.
        let hooks = (hooks as *const StartupHooks<'_>)
            .cast::<StartupHooks<'static>>()
            .cast_mut();
        if ACTIVE_HOOKS
            .compare_exchange(null_mut(), hooks, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            bootstrap_abort(format_args!("__libc_start_main hand-off started twice"));
        }

        __libc_start_main(
            catch_main,
            args.argc(),
            args.argv(),
            Some(call_init_array_functions),
            None,
            None,
            args.stack_end(),
        )
    }
}

unsafe fn active_hooks(callback: &str) -> &'static StartupHooks<'static> {
    let hooks = ACTIVE_HOOKS.load(Ordering::Acquire);
    if hooks.is_null() {
        bootstrap_abort(format_args!(
            "{} called outside a C runtime hand-off",
            callback
        ));
    }
    &*hooks
}

/// The "main" `__libc_start_main` calls. Resumes the interceptor and never
/// returns, so `__libc_start_main` never reaches its `exit`.
unsafe extern "C" fn catch_main(argc: c_int, argv: *mut *mut c_char, envp: *mut *mut c_char) -> c_int {
    (active_hooks("catch_main").main)(argc, argv, envp)
}

/// Depending on the C runtime and its version, `__libc_start_main` either
/// walks `.init_array` itself or calls this. Handing it over either way
/// means we never also walk the table ourselves.
///
/// `.fini_array` is not handled here; `exit` runs it.
unsafe extern "C" fn call_init_array_functions(
    argc: c_int,
    argv: *mut *mut c_char,
    envp: *mut *mut c_char,
) {
    (active_hooks("call_init_array_functions").init)(argc, argv, envp)
}

/// Initialize the C runtime: run every static initializer via the
/// platform's startup function, without letting it call `main` or `exit`.
///
/// # Safety
///
/// Call exactly once, before any hosted C code, with the `argc`/`argv` the
/// kernel placed on the initial stack. A second call aborts the process.
#[no_mangle]
pub unsafe extern "C" fn mustang_initialize_c_runtime(argc: c_int, argv: *mut *mut c_char) {
    if HANDED_OFF.swap(true, Ordering::AcqRel) {
        bootstrap_abort(format_args!("mustang_initialize_c_runtime called twice"));
    }
    let _ = std::ptr::read_volatile(&REGISTER_CLEANUP);

    #[cfg(debug_assertions)]
    let args = match StartupArgs::new(argc, argv) {
        Ok(args) => args,
        Err(err) => bootstrap_abort(format_args!("{}", err)),
    };
    #[cfg(not(debug_assertions))]
    let args = StartupArgs::new_unchecked(argc, argv);

    let interceptor = Interceptor::new(LibcStartMain, InitializerRange::linked());
    if let Err(err) = interceptor.initialize(args) {
        bootstrap_abort(format_args!("C runtime initialization failed: {}", err));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_hooks_before_hand_off() {
        // Nothing in the test binary starts a native hand-off.
        assert!(ACTIVE_HOOKS.load(Ordering::Acquire).is_null());
        assert!(!HANDED_OFF.load(Ordering::Acquire));
    }

    #[test]
    fn test_trampolines_match_platform_signatures() {
        let _main: MainFn = catch_main;
        let _init: InitFn = call_init_array_functions;
        let _export: unsafe extern "C" fn(c_int, *mut *mut c_char) = mustang_initialize_c_runtime;
    }

    #[test]
    fn test_cleanup_slot_holds_flush() {
        assert_eq!(REGISTER_CLEANUP as usize, flush_all_streams as usize);
        assert_eq!(
            crate::FiniSection::parse(crate::FINI_CLEANUP_SECTION).unwrap(),
            crate::FiniSection::Prioritized(0)
        );
    }
}
