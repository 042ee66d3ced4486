//! The static-initializer table.
//!
//! The table is owned by the link layer and treated as read-only. Entries
//! are invoked in ascending address order, which is index order here.

use std::fmt;

use libc::{c_char, c_int};

use crate::args::InitFn;

/// An ordered, read-only sequence of initializer entries.
#[derive(Clone, Copy)]
pub struct InitializerRange {
    entries: &'static [InitFn],
}

impl InitializerRange {
    pub const fn empty() -> Self {
        Self { entries: &[] }
    }

    /// A table built by the host instead of the linker.
    pub const fn from_static(entries: &'static [InitFn]) -> Self {
        Self { entries }
    }

    /// The executable's own `.init_array`, delimited by the linker-defined
    /// `__init_array_start` and `__init_array_end`.
    ///
    /// # Safety
    ///
    /// The linker must define both symbols around a contiguous array of
    /// [`InitFn`] pointers that nothing mutates afterwards.
    #[cfg(target_os = "linux")]
    pub unsafe fn linked() -> Self {
        extern "C" {
            static __init_array_start: u8;
            static __init_array_end: u8;
        }

        let start = std::ptr::addr_of!(__init_array_start) as usize;
        let end = std::ptr::addr_of!(__init_array_end) as usize;
        let count = end.saturating_sub(start) / std::mem::size_of::<InitFn>();
        if count == 0 {
            return Self::empty();
        }

        Self {
            entries: std::slice::from_raw_parts(start as *const InitFn, count),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &'static [InitFn] {
        self.entries
    }

    /// Invoke every entry in order with the same arguments. Returns the
    /// number of entries invoked.
    ///
    /// Not idempotent: calling this twice runs every initializer twice.
    ///
    /// # Safety
    ///
    /// Each entry is foreign code with the usual `.init_array` contract;
    /// `argv` and `envp` must be valid null-terminated arrays.
    pub unsafe fn run_all(
        &self,
        argc: c_int,
        argv: *mut *mut c_char,
        envp: *mut *mut c_char,
    ) -> usize {
        for entry in self.entries {
            entry(argc, argv, envp);
        }
        self.entries.len()
    }
}

impl Default for InitializerRange {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for InitializerRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitializerRange")
            .field("start", &self.entries.as_ptr())
            .field("len", &self.entries.len())
            .finish()
    }
}
