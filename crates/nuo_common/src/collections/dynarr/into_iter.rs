use std::{
    fmt,
    iter::FusedIterator,
    ptr::NonNull,
    slice,
};

use crate::{
    alloc::{Allocator, Mallocator},
    collections::{imp::array::RawArray, DoubleOrMinReserveStrategy, ReserveStrategy},
};

/// An iterator that moves out of a dynamic array.
///
/// Created by the `into_iter` method on [`DynArr`](super::DynArr) (provided by the [`IntoIterator`] trait).
/// Elements that were not yielded are destroyed through the allocator when the iterator is dropped.
pub struct IntoIter<T, A: Allocator = Mallocator, R: ReserveStrategy = DoubleOrMinReserveStrategy> {
    pub(super) arr:   RawArray<T, A, R>,
    pub(super) start: usize,
    pub(super) end:   usize,
}

impl<T, A: Allocator, R: ReserveStrategy> IntoIter<T, A, R> {
    /// Returns the remaining items of this iterator as a slice.
    ///
    /// # Examples
    ///
    /// ```
    /// # use nuo_common::prelude::*;
    /// let arr = dynarr!['a', 'b', 'c'];
    /// let mut into_iter = arr.into_iter();
    /// assert_eq!(into_iter.as_slice(), &['a', 'b', 'c']);
    /// let _ = into_iter.next().unwrap();
    /// assert_eq!(into_iter.as_slice(), &['b', 'c']);
    /// ```
    pub fn as_slice(&self) -> &[T] {
        unsafe { slice::from_raw_parts(self.arr.ptr().add(self.start), self.end - self.start) }
    }

    /// Returns the remaining items of this iterator as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        unsafe { slice::from_raw_parts_mut(self.arr.ptr().add(self.start), self.end - self.start) }
    }

    /// Returns a reference to the allocator that owns the buffer.
    pub fn allocator(&self) -> &A {
        self.arr.allocator()
    }
}

impl<T: fmt::Debug, A: Allocator, R: ReserveStrategy> fmt::Debug for IntoIter<T, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IntoIter").field(&self.as_slice()).finish()
    }
}

impl<T, A: Allocator, R: ReserveStrategy> AsRef<[T]> for IntoIter<T, A, R> {
    fn as_ref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T, A: Allocator, R: ReserveStrategy> Iterator for IntoIter<T, A, R> {
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.start == self.end {
            return None;
        }
        // SAFETY: Slots in `start..end` are initialized, and `start` is advanced so the value is never read again
        let value = unsafe {
            let slot = NonNull::new_unchecked(self.arr.ptr().add(self.start));
            self.arr.allocator_mut().take(slot)
        };
        self.start += 1;
        Some(value)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.end - self.start;
        (len, Some(len))
    }

    #[inline]
    fn count(self) -> usize {
        self.len()
    }
}

impl<T, A: Allocator, R: ReserveStrategy> DoubleEndedIterator for IntoIter<T, A, R> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.start == self.end {
            return None;
        }
        self.end -= 1;
        // SAFETY: The slot at `end` was initialized, and is now outside of the remaining range
        Some(unsafe {
            let slot = NonNull::new_unchecked(self.arr.ptr().add(self.end));
            self.arr.allocator_mut().take(slot)
        })
    }
}

impl<T, A: Allocator, R: ReserveStrategy> ExactSizeIterator for IntoIter<T, A, R> {}
impl<T, A: Allocator, R: ReserveStrategy> FusedIterator for IntoIter<T, A, R> {}

impl<T: Clone, A: Allocator + Clone, R: ReserveStrategy> Clone for IntoIter<T, A, R> {
    fn clone(&self) -> Self {
        let arr = super::DynArr::<T, A, R>::from_slice_in(self.as_slice(), self.arr.allocator().clone())
            .unwrap_or_else(|err| crate::collections::handle_error(err));
        arr.into_iter()
    }
}

impl<T, A: Allocator, R: ReserveStrategy> Drop for IntoIter<T, A, R> {
    fn drop(&mut self) {
        let base = self.arr.ptr();
        while self.start != self.end {
            let slot = unsafe { NonNull::new_unchecked(base.add(self.start)) };
            self.start += 1;
            // SAFETY: The slot was still initialized and is skipped from now on
            unsafe { self.arr.allocator_mut().destroy(slot) };
        }
        // RawArray handles deallocation
    }
}
