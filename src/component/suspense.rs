//! Deferred content
//!
//! A render function returns `Err(Interrupt::Suspend(handle))` when its
//! content is not ready. The engine keeps the position's current host output,
//! parks the component on the handle and re-renders it once the handle is
//! resolved.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use super::Updater;

#[derive(Default)]
struct SuspensionInner {
    resolved: Cell<bool>,
    parked: RefCell<Vec<Updater>>,
}

/// Shared readiness signal for deferred content.
#[derive(Clone, Default)]
pub struct Suspension(Rc<SuspensionInner>);

impl Suspension {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the content ready and force-update every parked component.
    pub fn resolve(&self) {
        if self.0.resolved.replace(true) {
            return;
        }
        let parked = std::mem::take(&mut *self.0.parked.borrow_mut());
        debug!(parked = parked.len(), "suspension resolved");
        for updater in parked {
            updater.force_update();
        }
    }

    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.0.resolved.get()
    }

    /// Wait for resolution. Already resolved handles update right away.
    pub(crate) fn park(&self, updater: Updater) {
        if self.is_resolved() {
            updater.force_update();
        } else if !self.0.parked.borrow().contains(&updater) {
            self.0.parked.borrow_mut().push(updater);
        }
    }

    pub(crate) fn parked(&self) -> usize {
        self.0.parked.borrow().len()
    }
}

impl PartialEq for Suspension {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Suspension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suspension")
            .field("resolved", &self.0.resolved.get())
            .field("parked", &self.parked())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_is_idempotent() {
        let s = Suspension::new();
        assert!(!s.is_resolved());
        s.resolve();
        s.resolve();
        assert!(s.is_resolved());
        assert_eq!(s.parked(), 0);
    }

    #[test]
    fn test_clones_share_state() {
        let a = Suspension::new();
        let b = a.clone();
        b.resolve();
        assert!(a.is_resolved());
        assert_eq!(a, b);
        assert_ne!(a, Suspension::new());
    }
}
