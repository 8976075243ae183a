use std::{mem, ptr::NonNull};

use crate::alloc::Allocator;

/// Counts the slots that were successfully constructed during a bulk operation.
///
/// When dropped without being committed (because constructing an element panicked), all slots constructed so far are destroyed again,
/// leaving the memory exactly as uninitialized as it was before the guard was created.
pub(crate) struct InitGuard<'a, T, A: Allocator> {
    alloc:       &'a mut A,
    base:        *mut T,
    initialized: usize,
}

impl<'a, T, A: Allocator> InitGuard<'a, T, A> {
    /// Create a guard constructing elements from `base` onwards.
    ///
    /// # Safety
    ///
    /// `base` must point to uninitialized slots, which were allocated by `alloc` and which can hold all elements constructed through the guard.
    pub unsafe fn new(alloc: &'a mut A, base: *mut T) -> Self {
        Self { alloc, base, initialized: 0 }
    }

    /// Construct the next element.
    ///
    /// # Safety
    ///
    /// The slot after the last constructed element needs to be in bounds of the buffer.
    pub unsafe fn construct(&mut self, value: T) {
        let slot = NonNull::new_unchecked(self.base.add(self.initialized));
        self.alloc.construct(slot, value);
        self.initialized += 1;
    }

    /// Keep all constructed elements, returning how many there are.
    pub fn commit(self) -> usize {
        let initialized = self.initialized;
        mem::forget(self);
        initialized
    }
}

impl<T, A: Allocator> Drop for InitGuard<'_, T, A> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            common_log!(log_verbose, "rolling back {} constructed elements", self.initialized);
        }
        while self.initialized > 0 {
            self.initialized -= 1;
            // SAFETY: Every slot below `initialized` was constructed by this guard
            unsafe { self.alloc.destroy(NonNull::new_unchecked(self.base.add(self.initialized))) };
        }
    }
}
