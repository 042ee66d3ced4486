// =============================================================================
// interceptor.rs: C runtime hand-off
// =============================================================================
//
// Flow of one `Interceptor::initialize` call:
//
//   caller thread                       startup worker (detached)
//   -------------                       -------------------------
//   arm ResumptionPoint
//   spawn worker  ───────────────────▶  platform.start_main(args, hooks)
//   point.wait()  (blocked)               ├─ hooks.init  → Session::run_initializers
//                                         └─ hooks.main  → Session::dispatch
//   ◀──────────────────────────────────────── resumer.resume(..), then park forever
//   check convention, return report
//
// The worker is never joined and never unwinds past the entry callback, so
// the platform's exit path is unreachable from here.
// =============================================================================

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use libc::{c_char, c_int};

use crate::args::StartupArgs;
use crate::initializers::InitializerRange;
use crate::platform::{InitConvention, StartupHooks, StartupPlatform};
use crate::resume::{self, Resumer};
use crate::{InitError, Result};
use crt_init_config::{log_startup_debug, log_startup_error, log_startup_info, StartupConfig};

/// What the hand-off observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitReport {
    /// Convention that was enforced.
    pub convention: InitConvention,
    /// Times the init callback ran.
    pub init_passes: usize,
    /// Initializer entries invoked through the init callback.
    pub entries_run: usize,
    /// The `envp` the platform handed to the entry callback.
    pub envp: *mut *mut c_char,
}

/// Arguments the entry callback received.
struct Resumed {
    argc: c_int,
    argv: *mut *mut c_char,
    envp: *mut *mut c_char,
}

// SAFETY: plain pointer values crossing from the startup worker back to the
// caller; nothing is dereferenced on the way.
unsafe impl Send for Resumed {}

/// Counters shared between the caller and the startup worker for one call.
///
/// The [`Resumer`] is not in here: only the worker owns it, so a worker
/// that dies before the entry callback drops it and the caller sees
/// `Abandoned` instead of waiting forever.
struct Session {
    table: InitializerRange,
    passes: AtomicUsize,
    entries_run: AtomicUsize,
}

impl Session {
    /// The init callback. Walks the table on every call; counting passes is
    /// how a platform that calls it twice gets caught.
    fn run_initializers(&self, argc: c_int, argv: *mut *mut c_char, envp: *mut *mut c_char) {
        let pass = self.passes.fetch_add(1, Ordering::AcqRel) + 1;
        log_startup_debug!(
            "Running static initializers",
            pass = pass,
            entries = self.table.len()
        );
        let ran = unsafe { self.table.run_all(argc, argv, envp) };
        self.entries_run.fetch_add(ran, Ordering::AcqRel);
    }

    /// The decoy entry callback. Hands control back to the caller and never
    /// returns into the platform.
    fn dispatch(
        resumer: &Resumer<Resumed>,
        argc: c_int,
        argv: *mut *mut c_char,
        envp: *mut *mut c_char,
    ) -> ! {
        if let Err(err) = resumer.resume(Resumed { argc, argv, envp }) {
            log_startup_error!(
                "Entry callback could not resume caller",
                error = tracing::field::display(&err)
            );
        }
        park_forever()
    }
}

fn park_forever() -> ! {
    loop {
        thread::park();
    }
}

/// Single-use hand-off to a [`StartupPlatform`].
pub struct Interceptor<P> {
    platform: Arc<P>,
    table: InitializerRange,
    config: StartupConfig,
    entered: AtomicBool,
}

impl<P: StartupPlatform> Interceptor<P> {
    /// Use the process-wide config installed with `crt_init_config::install`.
    pub fn new(platform: P, table: InitializerRange) -> Self {
        Self::with_config(platform, table, crt_init_config::config())
    }

    pub fn with_config(platform: P, table: InitializerRange, config: StartupConfig) -> Self {
        Self {
            platform: Arc::new(platform),
            table,
            config,
            entered: AtomicBool::new(false),
        }
    }

    pub fn convention(&self) -> InitConvention {
        InitConvention::resolve(self.config.convention, self.platform.convention())
    }

    pub fn table(&self) -> InitializerRange {
        self.table
    }

    /// Run the platform startup call until its entry callback fires, then
    /// return with every static initializer run.
    ///
    /// Usable once per `Interceptor`; later calls fail with
    /// [`InitError::Reentered`] without touching the platform.
    ///
    /// # Safety
    ///
    /// `args` must stay valid for the life of the process (the abandoned
    /// worker keeps it), and the platform must honour its
    /// [`StartupPlatform::start_main`] contract.
    pub unsafe fn initialize(&self, args: StartupArgs) -> Result<InitReport> {
        if self.entered.swap(true, Ordering::AcqRel) {
            return Err(InitError::Reentered);
        }

        let convention = self.convention();
        if self.config.diagnostics {
            bootstrap_diag!(
                "handing off to the C runtime (argc={}, initializers={}, convention={:?})",
                args.argc(),
                self.table.len(),
                convention
            );
        }

        let (point, resumer) = resume::arm::<Resumed>();
        let session = Arc::new(Session {
            table: self.table,
            passes: AtomicUsize::new(0),
            entries_run: AtomicUsize::new(0),
        });

        let mut builder = thread::Builder::new().name(self.config.worker_name.clone());
        if let Some(size) = self.config.worker_stack_size {
            builder = builder.stack_size(size);
        }

        let worker_session = Arc::clone(&session);
        let platform = Arc::clone(&self.platform);
        // Detached: the handle is dropped and the worker is never joined.
        let _detached = builder.spawn(move || {
            let init = |argc: c_int, argv: *mut *mut c_char, envp: *mut *mut c_char| {
                worker_session.run_initializers(argc, argv, envp)
            };
            let main = |argc: c_int, argv: *mut *mut c_char, envp: *mut *mut c_char| -> c_int {
                Session::dispatch(&resumer, argc, argv, envp)
            };
            let hooks = StartupHooks {
                main: &main,
                init: &init,
            };
            unsafe { platform.start_main(args, &hooks) };
        })?;
        log_startup_debug!(
            "Startup worker spawned",
            worker = self.config.worker_name.as_str()
        );

        let resumed = point.wait()?;
        if resumed.argc != args.argc() || resumed.argv != args.argv() {
            return Err(InitError::ArgsMismatch {
                expected_argc: args.argc(),
                argc: resumed.argc,
            });
        }

        let passes = session.passes.load(Ordering::Acquire);
        if passes != convention.expected_passes() {
            log_startup_error!(
                "Init callback count does not match convention",
                passes = passes,
                expected = convention.expected_passes()
            );
            return Err(InitError::ConventionViolated {
                expected: convention,
                passes,
            });
        }

        let report = InitReport {
            convention,
            init_passes: passes,
            entries_run: session.entries_run.load(Ordering::Acquire),
            envp: resumed.envp,
        };
        log_startup_info!(
            "C runtime initialized",
            passes = report.init_passes,
            entries = report.entries_run
        );
        if self.config.diagnostics {
            bootstrap_diag!(
                "C runtime initialized ({} initializer(s) via callback)",
                report.entries_run
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ResumeError;
    use std::ptr::null_mut;

    /// Calls init once, then main. Never exits.
    struct Immediate;

    impl StartupPlatform for Immediate {
        fn convention(&self) -> InitConvention {
            InitConvention::CallerSupplied
        }

        unsafe fn start_main(&self, args: StartupArgs, hooks: &StartupHooks<'_>) -> ! {
            let mut env: [*mut c_char; 1] = [null_mut()];
            (hooks.init)(args.argc(), args.argv(), env.as_mut_ptr());
            (hooks.main)(args.argc(), args.argv(), env.as_mut_ptr());
            unreachable!("entry callback returned");
        }
    }

    /// Unwinds before reaching either callback.
    struct Crashes;

    impl StartupPlatform for Crashes {
        unsafe fn start_main(&self, _: StartupArgs, _: &StartupHooks<'_>) -> ! {
            panic!("simulated startup crash");
        }
    }

    fn empty_args() -> (Box<[*mut c_char; 1]>, StartupArgs) {
        let mut argv = Box::new([null_mut::<c_char>()]);
        let args = unsafe { StartupArgs::new(0, argv.as_mut_ptr()) }.unwrap();
        (argv, args)
    }

    #[test]
    fn test_immediate_platform() {
        let (_argv, args) = empty_args();
        let interceptor = Interceptor::with_config(
            Immediate,
            InitializerRange::empty(),
            StartupConfig::default(),
        );
        let report = unsafe { interceptor.initialize(args) }.unwrap();
        assert_eq!(report.init_passes, 1);
        assert_eq!(report.entries_run, 0);
        assert!(!report.envp.is_null());
    }

    #[test]
    fn test_reentry_rejected() {
        let (_argv, args) = empty_args();
        let interceptor = Interceptor::with_config(
            Immediate,
            InitializerRange::empty(),
            StartupConfig::default(),
        );
        unsafe { interceptor.initialize(args) }.unwrap();
        let err = unsafe { interceptor.initialize(args) }.unwrap_err();
        assert!(matches!(err, InitError::Reentered));
    }

    #[test]
    fn test_crashing_platform_is_abandoned() {
        let (_argv, args) = empty_args();
        let interceptor =
            Interceptor::with_config(Crashes, InitializerRange::empty(), StartupConfig::default());
        let err = unsafe { interceptor.initialize(args) }.unwrap_err();
        assert!(matches!(err, InitError::Resume(ResumeError::Abandoned)));
    }
}
