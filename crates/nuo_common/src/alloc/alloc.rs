use std::{alloc::Layout, ptr::NonNull};

//------------------------------------------------------------------------------------------------------------------------------

/// Error returned when an allocator could not provide the requested memory
#[derive(Clone, Copy, PartialEq, Eq, Debug, thiserror::Error)]
#[error("failed to allocate {} bytes with an alignment of {}", .layout.size(), .layout.align())]
pub struct AllocError {
    /// Layout of the failed request
    pub layout: Layout,
}

//------------------------------------------------------------------------------------------------------------------------------

/// Allocator capability used by the containers to get at heap memory and to construct/destroy individual slots
///
/// Containers hold their allocator by value and route every raw allocation, element construction and element destruction through it.
///
/// # Safety
///
/// - Memory returned by `allocate` must be valid for reads and writes of `layout.size()` bytes and aligned to `layout.align()`,
///   until it is passed back to `deallocate` of this allocator, or any allocator that compares equal to it.
/// - `is_equal` must be an equivalence relation, and equal allocators must be able to free each other's memory.
/// - When `IS_ALWAYS_EQUAL` is set, `is_equal` must return `true` for any 2 instances.
pub unsafe trait Allocator {
    /// Move assignment of a container also moves the allocator over.
    const PROPAGATE_ON_MOVE_ASSIGNMENT: bool = false;
    /// Swapping containers also swaps their allocators.
    const PROPAGATE_ON_SWAP: bool = false;
    /// Every instance of this allocator can free memory allocated by any other instance.
    const IS_ALWAYS_EQUAL: bool = false;

    /// Allocate a block of memory fitting `layout`.
    ///
    /// Containers never request a zero-sized layout.
    fn allocate(&mut self, layout: Layout) -> Result<NonNull<u8>, AllocError>;

    /// Deallocate memory previously returned by `allocate`.
    ///
    /// # Safety
    ///
    /// `ptr` must have been allocated by this allocator (or one equal to it) with the same `layout`, and not have been freed yet.
    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, layout: Layout);

    /// Construct `value` into an uninitialized slot.
    ///
    /// # Safety
    ///
    /// `slot` must be valid for writes and properly aligned. Any previous value in `slot` is overwritten without being dropped.
    unsafe fn construct<T>(&mut self, slot: NonNull<T>, value: T) {
        slot.as_ptr().write(value);
    }

    /// Destroy the value in an initialized slot, leaving it uninitialized.
    ///
    /// # Safety
    ///
    /// `slot` must point to an initialized value that is not used again afterwards.
    unsafe fn destroy<T>(&mut self, slot: NonNull<T>) {
        core::ptr::drop_in_place(slot.as_ptr());
    }

    /// Move the value out of an initialized slot, leaving it uninitialized.
    ///
    /// Ends the value's lifetime in the slot the same way `destroy` does, without dropping it.
    ///
    /// # Safety
    ///
    /// `slot` must point to an initialized value that is not used again afterwards.
    unsafe fn take<T>(&mut self, slot: NonNull<T>) -> T {
        slot.as_ptr().read()
    }

    /// Check whether memory allocated by `self` can be deallocated by `other`, and vice versa.
    fn is_equal(&self, other: &Self) -> bool;
}

/// Check if 2 allocators are interchangeable, taking `IS_ALWAYS_EQUAL` into account.
#[inline]
pub fn allocators_equal<A: Allocator>(a: &A, b: &A) -> bool {
    A::IS_ALWAYS_EQUAL || a.is_equal(b)
}
