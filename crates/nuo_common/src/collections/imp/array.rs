use std::{
    alloc::Layout,
    marker::PhantomData,
    mem::{self, size_of},
    ptr::{self, NonNull},
};

use crate::{
    alloc::Allocator,
    collections::{BufferId, DynArrError, ReserveStrategy},
};

/// Low level utility for more ergonomically allocating, reallocating, and deallocating a buffer of memory through an allocator,
/// without having to worry about all the corner cases involved.
/// In particular:
///
/// - Never calls the allocator for zero-sized types, the capacity of those is purely numerical.
/// - Never calls the allocator for zero-length buffers.
/// - Catches all overflows in capacity computations (promotes them to `LengthExceeded` errors).
/// - Gives every buffer it installs a new `BufferId`.
///
/// This type does not in any way inspect the memory it manages. When dropped it *will* free its memory, but it *won't* try to drop its contents.
/// It is up to the user of `RawArray` to handle the actual things *stored* inside of `RawArray`.
pub(crate) struct RawArray<T, A: Allocator, R: ReserveStrategy> {
    ptr:      Option<NonNull<T>>,
    cap:      usize,
    alloc:    A,
    id:       BufferId,
    _phantom: PhantomData<fn() -> R>,
}

unsafe impl<T: Send, A: Allocator + Send, R: ReserveStrategy> Send for RawArray<T, A, R> {}
unsafe impl<T: Sync, A: Allocator + Sync, R: ReserveStrategy> Sync for RawArray<T, A, R> {}

impl<T, A: Allocator, R: ReserveStrategy> RawArray<T, A, R> {
    /// Create a `RawArray` without allocating.
    pub fn new_in(alloc: A) -> Self {
        Self { ptr: None, cap: 0, alloc, id: BufferId::new(), _phantom: PhantomData }
    }

    /// Create a `RawArray` with exactly the requested capacity.
    pub fn try_with_capacity_in(capacity: usize, mut alloc: A) -> Result<Self, DynArrError> {
        let ptr = allocate_slots::<T, A>(&mut alloc, capacity)?;
        Ok(Self { ptr, cap: capacity, alloc, id: BufferId::new(), _phantom: PhantomData })
    }

    /// Maximum number of elements any buffer of `T` can hold.
    pub const fn max_capacity() -> usize {
        max_slots::<T>()
    }

    /// Get the capacity of the allocation.
    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    pub fn allocator_mut(&mut self) -> &mut A {
        &mut self.alloc
    }

    /// Identity of the buffer currently held.
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Give the current buffer a new identity, invalidating all cursors into it.
    pub fn renew_id(&mut self) {
        self.id = BufferId::new();
    }

    /// Get a raw pointer to the start of the allocation.
    /// Note that this is a dangling pointer when `capacity() == 0`.
    pub fn ptr(&self) -> *mut T {
        self.non_null().as_ptr()
    }

    pub fn non_null(&self) -> NonNull<T> {
        self.ptr.unwrap_or(NonNull::dangling())
    }

    /// Ensures that the buffer can hold at least `required` elements, growing according to the reserve strategy.
    ///
    /// `len` is the number of initialized elements that need to be carried over to a new buffer.
    pub fn try_reserve(&mut self, len: usize, required: usize) -> Result<(), DynArrError> {
        if required <= self.cap {
            return Ok(());
        }
        let new_cap = self.grown_capacity(required)?;
        self.relocate(len, new_cap)
    }

    /// Ensures that the buffer can hold at least `required` elements, growing to exactly `required` if it can't.
    pub fn try_reserve_exact(&mut self, len: usize, required: usize) -> Result<(), DynArrError> {
        if required <= self.cap {
            return Ok(());
        }
        self.relocate(len, required)
    }

    /// Shrinks the buffer down to the `len` elements it holds.
    /// If `len` is 0, actually completely deallocates.
    pub fn shrink_to_fit(&mut self, len: usize) -> Result<(), DynArrError> {
        debug_assert!(len <= self.cap);
        if len == self.cap {
            return Ok(());
        }
        self.relocate(len, len)
    }

    /// Free the buffer and go back to the state of a newly created `RawArray`.
    ///
    /// Any elements still in the buffer are forgotten.
    pub fn release(&mut self) {
        let ptr = self.ptr.take();
        let cap = mem::replace(&mut self.cap, 0);
        // SAFETY: `ptr` and `cap` describe the buffer we owned
        unsafe { deallocate_slots(&mut self.alloc, ptr, cap) };
        self.renew_id();
    }

    /// Swap buffers (including their identity), but keep the allocators in place.
    pub fn swap_buffers(&mut self, other: &mut Self) {
        mem::swap(&mut self.ptr, &mut other.ptr);
        mem::swap(&mut self.cap, &mut other.cap);
        mem::swap(&mut self.id, &mut other.id);
    }

    //--------------------------------------------------------------

    fn grown_capacity(&self, required: usize) -> Result<usize, DynArrError> {
        let max = Self::max_capacity();
        if required > max {
            return Err(DynArrError::LengthExceeded { requested: required, max });
        }
        let new_cap = R::calculate(self.cap, required).map_or(max, |cap| cap.min(max));
        if new_cap < required {
            return Err(DynArrError::LengthExceeded { requested: required, max });
        }
        Ok(new_cap)
    }

    /// Move the first `len` elements into a new buffer of `new_cap` slots.
    /// On failure, the original buffer is left untouched.
    fn relocate(&mut self, len: usize, new_cap: usize) -> Result<(), DynArrError> {
        debug_assert!(len <= new_cap && len <= self.cap);

        let new_ptr = allocate_slots::<T, A>(&mut self.alloc, new_cap)?;
        if let (Some(old), Some(new)) = (self.ptr, new_ptr) {
            // SAFETY: Both buffers hold at least `len` slots and are distinct allocations
            unsafe { ptr::copy_nonoverlapping(old.as_ptr(), new.as_ptr(), len) };
        }

        // SAFETY: The elements were moved over, so the old buffer only holds uninitialized slots
        unsafe { deallocate_slots(&mut self.alloc, self.ptr, self.cap) };

        common_log!(log_debug, "relocated {len} elements from a buffer of {} slots to one of {new_cap} slots", self.cap);
        self.ptr = new_ptr;
        self.cap = new_cap;
        self.renew_id();
        Ok(())
    }
}

impl<T, A: Allocator, R: ReserveStrategy> Drop for RawArray<T, A, R> {
    fn drop(&mut self) {
        // SAFETY: `ptr` and `cap` describe the buffer we own
        unsafe { deallocate_slots(&mut self.alloc, self.ptr, self.cap) };
    }
}

//--------------------------------------------------------------

pub(crate) const fn max_slots<T>() -> usize {
    if size_of::<T>() == 0 {
        usize::MAX
    } else {
        isize::MAX as usize / size_of::<T>()
    }
}

/// Allocate a buffer for `cap` elements of `T`.
///
/// Returns `None` when no memory is needed, and a dangling pointer for zero-sized types.
pub(crate) fn allocate_slots<T, A: Allocator>(alloc: &mut A, cap: usize) -> Result<Option<NonNull<T>>, DynArrError> {
    if cap == 0 {
        return Ok(None);
    }
    if size_of::<T>() == 0 {
        return Ok(Some(NonNull::dangling()));
    }

    let max = max_slots::<T>();
    if cap > max {
        return Err(DynArrError::LengthExceeded { requested: cap, max });
    }
    let layout = Layout::array::<T>(cap).map_err(|_| DynArrError::LengthExceeded { requested: cap, max })?;

    match alloc.allocate(layout) {
        Ok(ptr) => Ok(Some(ptr.cast())),
        Err(err) => {
            common_log!(log_warning, "{err}");
            Err(err.into())
        },
    }
}

/// Deallocate a buffer returned by `allocate_slots`.
///
/// # Safety
///
/// `ptr` and `cap` need to come from the same call to `allocate_slots` with an allocator equal to `alloc`.
pub(crate) unsafe fn deallocate_slots<T, A: Allocator>(alloc: &mut A, ptr: Option<NonNull<T>>, cap: usize) {
    let Some(ptr) = ptr else { return; };
    if size_of::<T>() == 0 {
        return;
    }
    // The layout was valid when the buffer was allocated
    let layout = Layout::from_size_align_unchecked(size_of::<T>() * cap, mem::align_of::<T>());
    alloc.deallocate(ptr.cast(), layout);
}
