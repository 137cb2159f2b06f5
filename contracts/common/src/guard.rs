//! Re-entrancy Guard
//!
//! One guard per position manager. Entering while the guard is held fails
//! immediately with `Reentrancy`; it never blocks. The guard is released
//! when the returned scope is dropped, on success and failure alike.

use core::cell::Cell;

use crate::errors::{UsdpError, UsdpResult};

/// Mutual-exclusion flag shared by every guarded operation of an instance
#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    entered: Cell<bool>,
}

impl ReentrancyGuard {
    /// Create an unlocked guard
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the guard for the lifetime of the returned scope
    pub fn enter(&self) -> UsdpResult<GuardScope<'_>> {
        if self.entered.replace(true) {
            return Err(UsdpError::Reentrancy);
        }
        Ok(GuardScope { guard: self })
    }

    /// Returns true while a guarded operation is running
    pub fn is_entered(&self) -> bool {
        self.entered.get()
    }
}

/// Held guard; releases on drop
#[derive(Debug)]
#[must_use = "the guard is released as soon as the scope is dropped"]
pub struct GuardScope<'a> {
    guard: &'a ReentrancyGuard,
}

impl Drop for GuardScope<'_> {
    fn drop(&mut self) {
        self.guard.entered.set(false);
    }
}
