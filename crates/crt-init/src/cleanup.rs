//! Exit-time stdio flush.
//!
//! Skipping the platform's `main`/`exit` sequence must not lose buffered
//! output, so a finalizer that flushes every open `FILE` is registered in
//! the lowest-priority `.fini_array` slot. That slot runs after every other
//! finalizer, so output written during finalization is still flushed.
//!
//! [`FinalizerTable`] models how the linker lays out `.fini_array*` input
//! sections and how the platform runs them at exit, so the ordering can be
//! checked without exiting a process.

use std::cmp::Ordering;

use crate::{InitError, Result};
use crt_init_config::log_cleanup_debug;

/// Section holding the flush registration: priority 0. The registration
/// itself sits next to the C ABI export in `native`.
pub const FINI_CLEANUP_SECTION: &str = ".fini_array.00000";

/// Flush every open stdio stream. The status is discarded; flushing at
/// exit is best-effort.
pub extern "C" fn flush_all_streams() {
    unsafe {
        let _ = libc::fflush(std::ptr::null_mut());
    }
}

/// A `.fini_array` input section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiniSection {
    /// `.fini_array.NNNNN`
    Prioritized(u16),
    /// Plain `.fini_array`
    Unprioritized,
}

impl FiniSection {
    pub fn parse(name: &str) -> Result<Self> {
        match name.strip_prefix(".fini_array") {
            Some("") => Ok(FiniSection::Unprioritized),
            Some(rest) => rest
                .strip_prefix('.')
                .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|digits| digits.parse::<u16>().ok())
                .map(FiniSection::Prioritized)
                .ok_or_else(|| InitError::InvalidSection(name.to_string())),
            None => Err(InitError::InvalidSection(name.to_string())),
        }
    }

    /// Output order the linker gives input sections: prioritized sections
    /// first by ascending priority, then unprioritized ones.
    fn layout_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (FiniSection::Prioritized(a), FiniSection::Prioritized(b)) => a.cmp(b),
            (FiniSection::Prioritized(_), FiniSection::Unprioritized) => Ordering::Less,
            (FiniSection::Unprioritized, FiniSection::Prioritized(_)) => Ordering::Greater,
            (FiniSection::Unprioritized, FiniSection::Unprioritized) => Ordering::Equal,
        }
    }
}

struct Finalizer {
    section: FiniSection,
    name: String,
    run: Box<dyn FnOnce()>,
}

/// Finalizers in link order, run the way the platform's exit does.
#[derive(Default)]
pub struct FinalizerTable {
    entries: Vec<Finalizer>,
}

impl FinalizerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a finalizer contributed by the next object in link order.
    pub fn register(
        &mut self,
        section: &str,
        name: impl Into<String>,
        run: impl FnOnce() + 'static,
    ) -> Result<()> {
        self.entries.push(Finalizer {
            section: FiniSection::parse(section)?,
            name: name.into(),
            run: Box::new(run),
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names in the order the finalizers will run.
    pub fn exit_order(&self) -> Vec<&str> {
        self.exit_indices()
            .into_iter()
            .map(|i| self.entries[i].name.as_str())
            .collect()
    }

    /// Run every finalizer in exit order, consuming the table.
    pub fn run_at_exit(self) {
        let order = self.exit_indices();
        let mut slots: Vec<Option<Finalizer>> = self.entries.into_iter().map(Some).collect();
        for i in order {
            if let Some(finalizer) = slots[i].take() {
                log_cleanup_debug!("Running finalizer", name = finalizer.name.as_str());
                (finalizer.run)();
            }
        }
    }

    /// `.fini_array` runs from the end of the output section backwards.
    fn exit_indices(&self) -> Vec<usize> {
        let mut layout: Vec<usize> = (0..self.entries.len()).collect();
        // Stable: objects keep link order within a priority.
        layout.sort_by(|&a, &b| self.entries[a].section.layout_cmp(&self.entries[b].section));
        layout.reverse();
        layout
    }
}
