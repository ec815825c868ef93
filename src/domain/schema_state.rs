//! Process-wide schema readiness flag.
//!
//! [`SchemaState`] starts out `false` and flips to `true` exactly once,
//! after the first successful bootstrap. It is never reset. It is an
//! explicit object rather than a global so each server (or test) owns its
//! own instance.

use std::sync::atomic::{AtomicBool, Ordering};

/// Readiness flag shared by every request handled in this process.
#[derive(Debug, Default)]
pub struct SchemaState {
    ready: AtomicBool,
}

impl SchemaState {
    /// Creates a flag in the not-ready state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
        }
    }

    /// Returns `true` once the schema has been bootstrapped.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Performs the false→true transition.
    ///
    /// Returns `true` only for the caller that actually flipped the flag;
    /// later (or racing) callers get `false`.
    pub fn mark_ready(&self) -> bool {
        self.ready
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
