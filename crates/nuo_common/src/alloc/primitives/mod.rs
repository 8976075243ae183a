mod mallocator;
pub use mallocator::*;

#[cfg(any(test, feature = "test_utils"))]
mod tracking_allocator;
#[cfg(any(test, feature = "test_utils"))]
pub use tracking_allocator::*;
