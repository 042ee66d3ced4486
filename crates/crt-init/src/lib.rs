//! # crt-init
//!
//! Runs the platform C runtime's static initialization for a process whose
//! startup is owned by something else (an origin-style runtime that
//! provides its own `_start`).
//!
//! The platform's `__libc_start_main` is the only mechanism that reliably
//! runs `.init_array` for every link configuration, but it also wants to
//! call `main` and then `exit`. We call it with a decoy entry point on a
//! startup worker thread. The decoy fires a one-shot resumption point and
//! parks forever, so the caller gets its thread back with every initializer
//! run and the platform's exit path never reached.
//!
//! Layout:
//!   - [`args`]         - `(argc, argv)` plus the C callback signatures
//!   - [`initializers`] - the read-only initializer table and its walk
//!   - [`resume`]       - one-shot resumption point
//!   - [`platform`]     - the `StartupPlatform` seam and init conventions
//!   - [`interceptor`]  - the hand-off itself
//!   - [`cleanup`]      - exit-time stdio flush and finalizer ordering
//!   - `native`         - `__libc_start_main` binding and the C ABI export
//!
//! The whole thing runs once, before any error-reporting infrastructure
//! exists. The Rust API reports failures as [`InitError`]; the C ABI export
//! turns them into a stderr line and `abort()`.

#[macro_use]
pub mod macros;

pub mod args;
pub mod cleanup;
pub mod initializers;
pub mod interceptor;
#[cfg(all(target_os = "linux", feature = "native"))]
pub mod native;
pub mod platform;
pub mod resume;

pub use args::{InitFn, MainFn, StartupArgs};
pub use cleanup::{flush_all_streams, FiniSection, FinalizerTable, FINI_CLEANUP_SECTION};
pub use initializers::InitializerRange;
pub use interceptor::{InitReport, Interceptor};
pub use platform::{InitConvention, StartupHooks, StartupPlatform};
pub use resume::{ResumeError, ResumptionPoint, Resumer};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InitError {
    #[error("C runtime hand-off already performed")]
    Reentered,

    #[error("invalid startup arguments: {0}")]
    InvalidArgs(&'static str),

    #[error("failed to spawn startup worker: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("resumption failed: {0}")]
    Resume(#[from] ResumeError),

    #[error("entry callback saw argc={argc}, expected {expected_argc} (or argv differed)")]
    ArgsMismatch { expected_argc: i32, argc: i32 },

    #[error("init callback ran {passes} time(s) under {expected:?}")]
    ConventionViolated {
        expected: InitConvention,
        passes: usize,
    },

    #[error("not a .fini_array section: {0}")]
    InvalidSection(String),
}

pub type Result<T> = std::result::Result<T, InitError>;
