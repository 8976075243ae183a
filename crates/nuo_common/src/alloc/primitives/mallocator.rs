use std::{
    alloc::{GlobalAlloc, Layout, System},
    ptr::NonNull,
};

use crate::alloc::{AllocError, Allocator};

/// Allocator calling directly to the system allocator
///
/// The mallocator is stateless, so all instances are interchangeable.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct Mallocator;

unsafe impl Allocator for Mallocator {
    const IS_ALWAYS_EQUAL: bool = true;

    fn allocate(&mut self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if layout.size() == 0 {
            // SAFETY: An alignment is never 0
            return Ok(unsafe { NonNull::new_unchecked(layout.align() as *mut u8) });
        }
        // SAFETY: The layout has a non-zero size
        NonNull::new(unsafe { System.alloc(layout) }).ok_or(AllocError { layout })
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() != 0 {
            System.dealloc(ptr.as_ptr(), layout);
        }
    }

    fn is_equal(&self, _other: &Self) -> bool {
        true
    }
}
