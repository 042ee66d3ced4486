//! Shared fixtures: a simulated `__libc_start_main` and recording
//! initializer tables.

#![allow(dead_code)]

use std::ffi::{c_char, c_int, CString};
use std::ptr::null_mut;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crt_init::{InitConvention, InitializerRange, StartupArgs, StartupHooks, StartupPlatform};

/// One initializer invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Call {
    pub index: usize,
    pub argc: c_int,
    pub argv: usize,
    pub envp: usize,
}

/// Declare a static log, one `extern "C"` initializer per index that
/// appends to it, and a static table of those initializers in order.
macro_rules! recording_table {
    ($table:ident, $log:ident, [$($idx:literal => $name:ident),* $(,)?]) => {
        static $log: std::sync::Mutex<Vec<crate::common::Call>> =
            std::sync::Mutex::new(Vec::new());
        $(
            unsafe extern "C" fn $name(
                argc: std::ffi::c_int,
                argv: *mut *mut std::ffi::c_char,
                envp: *mut *mut std::ffi::c_char,
            ) {
                $log.lock().unwrap().push(crate::common::Call {
                    index: $idx,
                    argc,
                    argv: argv as usize,
                    envp: envp as usize,
                });
            }
        )*
        static $table: &[crt_init::InitFn] = &[$($name),*];
    };
}

/// Indices in the order they were logged.
pub fn indices(log: &std::sync::Mutex<Vec<Call>>) -> Vec<usize> {
    log.lock().unwrap().iter().map(|c| c.index).collect()
}

/// NUL-terminated argument vector kept alive for the whole test process;
/// the abandoned startup worker may still hold its pointer.
pub struct OwnedArgv {
    _strings: Vec<CString>,
    ptrs: Vec<*mut c_char>,
}

impl OwnedArgv {
    pub fn leak(args: &[&str]) -> &'static mut OwnedArgv {
        let strings: Vec<CString> = args.iter().map(|a| CString::new(*a).unwrap()).collect();
        let mut ptrs: Vec<*mut c_char> = strings.iter().map(|s| s.as_ptr() as *mut c_char).collect();
        ptrs.push(null_mut());
        Box::leak(Box::new(OwnedArgv {
            _strings: strings,
            ptrs,
        }))
    }

    pub fn argc(&self) -> c_int {
        (self.ptrs.len() - 1) as c_int
    }

    pub fn argv(&mut self) -> *mut *mut c_char {
        self.ptrs.as_mut_ptr()
    }

    pub fn startup_args(&mut self) -> StartupArgs {
        unsafe { StartupArgs::new(self.argc(), self.argv()) }.unwrap()
    }
}

/// What the simulated platform saw and did.
#[derive(Default)]
pub struct StartupProbe {
    pub start_calls: AtomicUsize,
    pub argc: AtomicUsize,
    pub argv: AtomicUsize,
    pub stack_end: AtomicUsize,
    pub envp: AtomicUsize,
    pub exit_reached: AtomicBool,
}

/// A `__libc_start_main` stand-in.
///
/// Runs its own initializer walk if it has one (a platform that ignores
/// the callback), calls the init callback `init_calls` times, then the entry
/// callback, then "exits" by unwinding the worker.
pub struct SimulatedStartup {
    pub convention: InitConvention,
    pub init_calls: usize,
    pub own_walk: Option<InitializerRange>,
    pub crash_before_entry: bool,
    pub probe: Arc<StartupProbe>,
}

impl SimulatedStartup {
    /// Dynamically linked glibc: calls the init callback once.
    pub fn glibc() -> Self {
        Self {
            convention: InitConvention::CallerSupplied,
            init_calls: 1,
            own_walk: None,
            crash_before_entry: false,
            probe: Arc::new(StartupProbe::default()),
        }
    }

    /// musl: walks the table itself, never calls the callback.
    pub fn musl(table: InitializerRange) -> Self {
        Self {
            convention: InitConvention::PlatformRuns,
            init_calls: 0,
            own_walk: Some(table),
            ..Self::glibc()
        }
    }
}

impl StartupPlatform for SimulatedStartup {
    fn convention(&self) -> InitConvention {
        self.convention
    }

    unsafe fn start_main(&self, args: StartupArgs, hooks: &StartupHooks<'_>) -> ! {
        let probe = &self.probe;
        probe.start_calls.fetch_add(1, Ordering::SeqCst);
        probe.argc.store(args.argc() as usize, Ordering::SeqCst);
        probe.argv.store(args.argv() as usize, Ordering::SeqCst);
        probe.stack_end.store(args.stack_end() as usize, Ordering::SeqCst);

        if self.crash_before_entry {
            panic!("simulated crash inside startup");
        }

        // Lives on the worker stack, which stays parked after the entry
        // callback fires.
        let mut env: [*mut c_char; 2] = [c"CRT_INIT_TEST=1".as_ptr() as *mut c_char, null_mut()];
        let envp = env.as_mut_ptr();
        probe.envp.store(envp as usize, Ordering::SeqCst);

        if let Some(table) = self.own_walk {
            table.run_all(args.argc(), args.argv(), envp);
        }
        for _ in 0..self.init_calls {
            (hooks.init)(args.argc(), args.argv(), envp);
        }

        let status = (hooks.main)(args.argc(), args.argv(), envp);
        probe.exit_reached.store(true, Ordering::SeqCst);
        panic!("simulated exit({})", status);
    }
}
