#[cfg(feature = "std")]
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[cfg(not(feature = "std"))]
use spin::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A global slot holding at most one value, replaced only as a whole.
pub(crate) struct HookSlot<T: 'static + Send + Sync>(RwLock<Option<T>>);

impl<T: 'static + Send + Sync> HookSlot<T> {
    pub(crate) const fn empty() -> Self {
        Self(RwLock::new(None))
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<T>> {
        #[cfg(feature = "std")]
        let guard = self.0.read().unwrap_or_else(PoisonError::into_inner);

        #[cfg(not(feature = "std"))]
        let guard = self.0.read();

        guard
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<T>> {
        // The value is never left half-updated, so a poisoned lock is still
        // consistent.
        #[cfg(feature = "std")]
        let guard = self.0.write().unwrap_or_else(PoisonError::into_inner);

        #[cfg(not(feature = "std"))]
        let guard = self.0.write();

        guard
    }

    /// Runs `f` with the stored value, if any, while holding a read lock.
    pub(crate) fn with<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        f(self.read().as_ref())
    }

    /// Stores `value` unless the slot is occupied, in which case it is handed
    /// back.
    pub(crate) fn fill(&self, value: T) -> Result<(), T> {
        let mut slot = self.write();
        if slot.is_some() {
            return Err(value);
        }
        *slot = Some(value);
        Ok(())
    }

    /// Replaces the stored value, returning the previous one.
    pub(crate) fn swap(&self, value: Option<T>) -> Option<T> {
        core::mem::replace(&mut *self.write(), value)
    }
}
