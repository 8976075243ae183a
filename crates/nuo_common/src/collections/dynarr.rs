use core::{
    cmp, fmt,
    hash::Hash,
    iter,
    mem::{self, ManuallyDrop},
    ops::{self, Index, IndexMut},
    ptr::{self, NonNull},
    slice::{self, SliceIndex},
};

use scopeguard::ScopeGuard;

use crate::alloc::{allocators_equal, Allocator, Mallocator};

use super::{
    handle_error,
    imp::{array::RawArray, transaction::InitGuard},
    impl_slice_partial_eq_generic, DoubleOrMinReserveStrategy, DynArrError, ReserveStrategy,
};

mod cursor;
mod into_iter;

pub use cursor::{BufferId, Cursor, RevCursor};
pub use into_iter::IntoIter;

static_assertions::assert_impl_all!(DynArr<u32>: Send, Sync);
static_assertions::assert_not_impl_any!(DynArr<std::rc::Rc<u32>>: Send, Sync);

/// A contiguous growable array type, also known as a dynamic array, or DynArr.
///
/// Dynamic arrays have *O*(1) indexing, amortized *O*(1) push (to the end), and *O*(1) pop (from the back).
///
/// _Note: It was decided to not name this `Vec` as in the standard library, as this is easily confusable with a math vector_
///
/// # Examples
///
/// ```
/// # use nuo_common::prelude::*;
/// let mut arr = DynArr::new();
/// arr.push(1)?;
/// arr.push(2)?;
///
/// assert_eq!(arr.len(), 2);
/// assert_eq!(arr[0], 1);
///
/// arr[0] = 7;
/// assert_eq!(arr[0], 7);
///
/// arr.extend([1, 2, 3]);
/// assert_eq!(arr, [7, 2, 1, 2, 3]);
/// # Ok::<(), DynArrError>(())
/// ```
///
/// The [`dynarr!`] macro is provided for convenient initialization:
///
/// ```
/// # use nuo_common::prelude::*;
/// let mut arr1 = dynarr![1, 2, 3];
/// arr1.push(4)?;
/// let arr2 = dynarr![1, 2, 3, 4];
/// assert_eq!(arr1, arr2);
///
/// let zeros = dynarr![0; 5];
/// assert_eq!(zeros, [0, 0, 0, 0, 0]);
/// # Ok::<(), DynArrError>(())
/// ```
///
/// # Allocators
///
/// All memory, and every construction and destruction of an element, goes through the [`Allocator`] the array holds by value.
/// Whether the allocator moves along on [`move_assign`](DynArr::move_assign) and [`swap_with`](DynArr::swap_with) is decided by its propagation flags.
///
/// # Errors and rollback
///
/// Operations that can fail return a [`DynArrError`], and validate their arguments before touching the array.
/// If an operation fails, or user code (`Clone`, `Default`, an iterator, ...) panics halfway through,
/// all elements constructed by that operation are destroyed again, and the array is left as it was before the call.
///
/// # Cursors
///
/// Besides indices, positions can be given as [`Cursor`]s, which remember the identity of the buffer they were taken from.
/// Any reallocation, or any operation shifting elements, gives the buffer a new identity, so outdated cursors are rejected with
/// [`DynArrError::InvalidatedCursor`] instead of silently pointing at the wrong element.
///
/// # Capacity and reallocation
///
/// The capacity of a dynamic array is the amount of space allocated for any future elements that will be added onto the dynamic array.
/// This is not to be confused with the *length* of the dynamic array, which specifies the number of actual elements within the dynamic array.
/// If a dynamic array's length exceeds its capacity, its capacity will automatically be increased according to its [`ReserveStrategy`],
/// but its elements will have to be reallocated.
///
/// `DynArr` will never automatically shrink itself, even if completely empty.
/// If you wish to free up unused memory use [`shrink_to_fit`](DynArr::shrink_to_fit).
pub struct DynArr<T, A: Allocator = Mallocator, R: ReserveStrategy = DoubleOrMinReserveStrategy> {
    arr: RawArray<T, A, R>,
    len: usize,
}

impl<T> DynArr<T> {
    /// Constructs a new, empty `DynArr<T>`.
    ///
    /// The dynamic array will not allocate until elements are pushed onto it.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::new_in(Mallocator)
    }

    /// Constructs a new, empty `DynArr<T>` with exactly the specified capacity.
    pub fn with_capacity(capacity: usize) -> Result<Self, DynArrError> {
        Self::with_capacity_in(capacity, Mallocator)
    }

    /// Constructs a `DynArr<T>` holding `len` default values.
    pub fn with_len(len: usize) -> Result<Self, DynArrError> where
        T: Default
    {
        Self::with_len_in(len, Mallocator)
    }

    /// Constructs a `DynArr<T>` holding `len` clones of `value`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use nuo_common::prelude::*;
    /// let arr = DynArr::with_value(3, 7)?;
    /// assert_eq!(arr, [7, 7, 7]);
    /// # Ok::<(), DynArrError>(())
    /// ```
    pub fn with_value(len: usize, value: T) -> Result<Self, DynArrError> where
        T: Clone
    {
        Self::with_value_in(len, value, Mallocator)
    }
}

impl<T, A: Allocator, R: ReserveStrategy> DynArr<T, A, R> {
    /// Constructs a new, empty `DynArr<T, A, R>` using the given allocator.
    ///
    /// The dynamic array will not allocate until elements are pushed onto it.
    #[inline]
    #[must_use]
    pub fn new_in(alloc: A) -> Self {
        Self { arr: RawArray::new_in(alloc), len: 0 }
    }

    /// Constructs a new, empty `DynArr<T, A, R>` with exactly the specified capacity, using the given allocator.
    ///
    /// # Errors
    ///
    /// Returns `LengthExceeded` if `capacity` is larger than [`max_size`](DynArr::max_size), or `Alloc` if the allocator fails.
    pub fn with_capacity_in(capacity: usize, alloc: A) -> Result<Self, DynArrError> {
        Ok(Self { arr: RawArray::try_with_capacity_in(capacity, alloc)?, len: 0 })
    }

    /// Constructs a dynamic array holding `len` default values, using the given allocator.
    pub fn with_len_in(len: usize, alloc: A) -> Result<Self, DynArrError> where
        T: Default
    {
        let mut arr = Self::with_capacity_in(len, alloc)?;
        arr.extend_within_capacity(iter::repeat_with(T::default).take(len));
        Ok(arr)
    }

    /// Constructs a dynamic array holding `len` clones of `value`, using the given allocator.
    pub fn with_value_in(len: usize, value: T, alloc: A) -> Result<Self, DynArrError> where
        T: Clone
    {
        let mut arr = Self::with_capacity_in(len, alloc)?;
        arr.extend_within_capacity(iter::repeat(value).take(len));
        Ok(arr)
    }

    /// Constructs a dynamic array from the items of an iterator, using the given allocator.
    pub fn from_iter_in<I: IntoIterator<Item = T>>(iter: I, alloc: A) -> Result<Self, DynArrError> {
        let mut arr = Self::new_in(alloc);
        arr.append_range(iter)?;
        Ok(arr)
    }

    /// Constructs a dynamic array holding clones of the elements in `slice`, using the given allocator.
    ///
    /// Exactly `slice.len()` slots are allocated.
    pub fn from_slice_in(slice: &[T], alloc: A) -> Result<Self, DynArrError> where
        T: Clone
    {
        let mut arr = Self::with_capacity_in(slice.len(), alloc)?;
        arr.extend_within_capacity(slice.iter().cloned());
        Ok(arr)
    }

    /// Clone the dynamic array into a new one using the given allocator.
    pub fn try_clone_in(&self, alloc: A) -> Result<Self, DynArrError> where
        T: Clone
    {
        Self::from_slice_in(self.as_slice(), alloc)
    }

    /// Move the elements of `other` into a new dynamic array using the given allocator.
    ///
    /// If `alloc` can free the memory of `other`'s allocator, the buffer itself is taken over.
    /// Otherwise a buffer of exactly `other.len()` elements is allocated and the elements are moved into it.
    /// Either way, `other` is left empty.
    pub fn move_from_in(other: &mut Self, alloc: A) -> Result<Self, DynArrError> {
        let mut arr = Self::new_in(alloc);
        if allocators_equal(arr.arr.allocator(), other.arr.allocator()) {
            arr.arr.swap_buffers(&mut other.arr);
            mem::swap(&mut arr.len, &mut other.len);
        } else {
            arr.arr.try_reserve_exact(0, other.len)?;
            arr.relocate_from(other);
        }
        Ok(arr)
    }

    //--------------------------------------------------------------

    /// Replaces the contents with clones of the elements in `src`.
    ///
    /// When the current capacity is too small, the old buffer is released first, and a buffer of exactly `src.len()` elements is allocated.
    /// If that allocation fails, the dynamic array is left empty without a buffer.
    /// Otherwise the existing elements are overwritten using [`Clone::clone_from`], so their resources can be reused.
    pub fn assign_slice(&mut self, src: &[T]) -> Result<(), DynArrError> where
        T: Clone
    {
        if self.arr.capacity() < src.len() {
            self.reset_with_capacity(src.len())?;
            let mut this = scopeguard::guard_on_unwind(self, |arr| arr.arr.release());
            this.extend_within_capacity(src.iter().cloned());
            return Ok(());
        }

        self.truncate(src.len());
        let (overlap, rest) = src.split_at(self.len);
        for (dst, src) in self.as_mut_slice().iter_mut().zip(overlap) {
            dst.clone_from(src);
        }
        self.extend_within_capacity(rest.iter().cloned());
        Ok(())
    }

    /// Replaces the contents with clones of the elements in `other`, see [`assign_slice`](DynArr::assign_slice).
    pub fn assign_from(&mut self, other: &Self) -> Result<(), DynArrError> where
        T: Clone
    {
        self.assign_slice(other.as_slice())
    }

    /// Replaces the contents with `count` clones of `value`.
    pub fn assign_elem(&mut self, count: usize, value: T) -> Result<(), DynArrError> where
        T: Clone
    {
        if self.arr.capacity() < count {
            self.reset_with_capacity(count)?;
            let mut this = scopeguard::guard_on_unwind(self, |arr| arr.arr.release());
            this.extend_within_capacity(iter::repeat(value).take(count));
            return Ok(());
        }

        self.truncate(count);
        for dst in self.as_mut_slice() {
            dst.clone_from(&value);
        }
        let additional = count - self.len;
        self.extend_within_capacity(iter::repeat(value).take(additional));
        Ok(())
    }

    /// Replaces the contents with the items of an iterator.
    pub fn assign_iter<I: IntoIterator<Item = T>>(&mut self, iter: I) -> Result<(), DynArrError> {
        self.clear();
        self.append_range(iter)
    }

    /// Move the elements of `other` into `self`, dropping the current elements of `self`.
    ///
    /// - If the allocators are always equal, propagate on move assignment (in which case they are exchanged), or compare equal,
    ///   the buffer of `other` is taken over.
    /// - Otherwise, if `self` has enough capacity, the elements are moved into the existing buffer.
    /// - Otherwise, the buffer of `self` is released and one of exactly `other.len()` elements is allocated.
    ///   If that allocation fails, `self` is left empty without a buffer, and `other` is untouched.
    ///
    /// `other` is left empty on success.
    pub fn move_assign(&mut self, other: &mut Self) -> Result<(), DynArrError> {
        if A::IS_ALWAYS_EQUAL || A::PROPAGATE_ON_MOVE_ASSIGNMENT || self.arr.allocator().is_equal(other.arr.allocator()) {
            self.clear();
            self.arr.release();
            if A::PROPAGATE_ON_MOVE_ASSIGNMENT {
                mem::swap(&mut self.arr, &mut other.arr);
            } else {
                self.arr.swap_buffers(&mut other.arr);
            }
            mem::swap(&mut self.len, &mut other.len);
            return Ok(());
        }

        if self.arr.capacity() >= other.len {
            self.clear();
            self.arr.renew_id();
        } else {
            self.reset_with_capacity(other.len)?;
        }
        self.relocate_from(other);
        Ok(())
    }

    //--------------------------------------------------------------

    /// Returns the total number of elements the dynamic array can hold without reallocating.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.arr.capacity()
    }

    /// Returns the maximum number of elements a dynamic array of `T` could ever hold.
    #[inline]
    pub fn max_size(&self) -> usize {
        RawArray::<T, A, R>::max_capacity()
    }

    /// Returns a reference to the underlying allocator.
    #[inline]
    pub fn allocator(&self) -> &A {
        self.arr.allocator()
    }

    /// Reserves capacity for at least `capacity` elements in total.
    ///
    /// Does nothing if the capacity is already sufficient, otherwise the new capacity is picked by the reserve strategy.
    ///
    /// # Errors
    ///
    /// On failure the dynamic array is left unchanged.
    ///
    /// # Examples
    ///
    /// ```
    /// # use nuo_common::prelude::*;
    /// let mut arr = dynarr![1];
    /// arr.reserve(10)?;
    /// assert!(arr.capacity() >= 10);
    /// # Ok::<(), DynArrError>(())
    /// ```
    pub fn reserve(&mut self, capacity: usize) -> Result<(), DynArrError> {
        self.arr.try_reserve(self.len, capacity)
    }

    /// Reserves capacity for exactly `capacity` elements in total, if the current capacity is smaller.
    pub fn reserve_exact(&mut self, capacity: usize) -> Result<(), DynArrError> {
        self.arr.try_reserve_exact(self.len, capacity)
    }

    /// Shrinks the capacity of the dynamic array to its length, releasing the buffer when it is empty.
    ///
    /// If the allocator cannot provide the smaller buffer, the capacity stays as it is.
    pub fn shrink_to_fit(&mut self) {
        if let Err(err) = self.arr.shrink_to_fit(self.len) {
            common_log!(log_warning, "failed to shrink a dynamic array to {} elements: {err}", self.len);
        }
    }

    /// Resizes the dynamic array in-place so that `len` is equal to `new_len`.
    ///
    /// If `new_len` is greater than `len`, the dynamic array is extended by the difference, with each additional slot filled with `value`.
    /// If `new_len` is less than `len`, the dynamic array is simply truncated.
    ///
    /// # Examples
    ///
    /// ```
    /// # use nuo_common::prelude::*;
    /// let mut arr = dynarr!["hello"];
    /// arr.resize(3, "world")?;
    /// assert_eq!(arr, ["hello", "world", "world"]);
    ///
    /// let mut arr = dynarr![1, 2, 3, 4];
    /// arr.resize(2, 0)?;
    /// assert_eq!(arr, [1, 2]);
    /// # Ok::<(), DynArrError>(())
    /// ```
    pub fn resize(&mut self, new_len: usize, value: T) -> Result<(), DynArrError> where
        T: Clone
    {
        if new_len <= self.len {
            self.truncate(new_len);
            return Ok(());
        }
        self.reserve(new_len)?;
        let additional = new_len - self.len;
        self.extend_within_capacity(iter::repeat(value).take(additional));
        Ok(())
    }

    /// Resizes the dynamic array in-place, filling additional slots with default values.
    pub fn resize_default(&mut self, new_len: usize) -> Result<(), DynArrError> where
        T: Default
    {
        self.resize_with(new_len, T::default)
    }

    /// Resizes the dynamic array in-place, filling additional slots with the results of calling `f`.
    ///
    /// If `f` panics, the elements it already produced are destroyed and the length is restored.
    pub fn resize_with<F>(&mut self, new_len: usize, f: F) -> Result<(), DynArrError> where
        F: FnMut() -> T
    {
        if new_len <= self.len {
            self.truncate(new_len);
            return Ok(());
        }
        self.reserve(new_len)?;
        let additional = new_len - self.len;
        self.extend_within_capacity(iter::repeat_with(f).take(additional));
        Ok(())
    }

    /// Shortens the dynamic array, keeping the first `len` elements and dropping the rest.
    ///
    /// If `len` is greater or equal to the dynamic array's current length, this has no effect.
    /// Note that this method has no effect on the allocated capacity of the dynamic array.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.len {
            return;
        }
        let old_len = self.len;
        // Shrink first, a panicking destructor leaks the remaining elements instead of dropping them twice
        self.len = len;
        for index in len..old_len {
            let slot = self.slot(index);
            // SAFETY: The slot held a live element, which is now outside of `len`
            unsafe { self.arr.allocator_mut().destroy(slot) };
        }
    }

    /// Clears the dynamic array, removing all values.
    ///
    /// Note that this method has no effect on the allocated capacity of the dynamic array.
    #[inline]
    pub fn clear(&mut self) {
        self.truncate(0);
    }

    /// Returns the number of elements in the dynamic array, also referred to as the 'length'.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the dynamic array contains no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    //--------------------------------------------------------------

    /// Returns a reference to the element at `index`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` when `index >= len`.
    pub fn at(&self, index: usize) -> Result<&T, DynArrError> {
        let len = self.len;
        self.as_slice().get(index).ok_or(DynArrError::OutOfRange { index, len })
    }

    /// Returns a mutable reference to the element at `index`.
    pub fn at_mut(&mut self, index: usize) -> Result<&mut T, DynArrError> {
        let len = self.len;
        self.as_mut_slice().get_mut(index).ok_or(DynArrError::OutOfRange { index, len })
    }

    /// Returns the first element, or `None` if the dynamic array is empty.
    #[inline]
    pub fn front(&self) -> Option<&T> {
        self.as_slice().first()
    }

    #[inline]
    pub fn front_mut(&mut self) -> Option<&mut T> {
        self.as_mut_slice().first_mut()
    }

    /// Returns the last element, or `None` if the dynamic array is empty.
    #[inline]
    pub fn back(&self) -> Option<&T> {
        self.as_slice().last()
    }

    #[inline]
    pub fn back_mut(&mut self) -> Option<&mut T> {
        self.as_mut_slice().last_mut()
    }

    /// Extracts a slice containing the entire dynamic array.
    ///
    /// Equivalent to `&s[..]`.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        self
    }

    /// Extracts a mutable slice of the entire dynamic array.
    ///
    /// Equivalent to `&mut s[..]`.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        self
    }

    /// Returns a raw pointer to the dynamic array's buffer, or a dangling raw pointer valid for zero sized reads if the dynamic array didn't allocate.
    ///
    /// Modifying the dynamic array may cause its buffer to be reallocated, which would also make any pointer to it invalid.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.arr.ptr()
    }

    /// Returns an unsafe mutable pointer to the dynamic array's buffer, or a dangling raw pointer valid for zero sized reads if the dynamic array didn't allocate.
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.arr.ptr()
    }

    //--------------------------------------------------------------

    /// Cursor to the first element.
    #[inline]
    pub fn begin(&self) -> Cursor {
        self.cursor(0)
    }

    /// Cursor one past the last element.
    #[inline]
    pub fn end(&self) -> Cursor {
        self.cursor(self.len)
    }

    /// Reverse cursor to the last element.
    #[inline]
    pub fn rbegin(&self) -> RevCursor {
        RevCursor::new(self.end())
    }

    /// Reverse cursor one before the first element.
    #[inline]
    pub fn rend(&self) -> RevCursor {
        RevCursor::new(self.begin())
    }

    /// Convert a cursor to an index in `0..=len`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidatedCursor` if the cursor does not belong to the current buffer, and `OutOfRange` if it lies past the end.
    pub fn index_of(&self, cursor: Cursor) -> Result<usize, DynArrError> {
        let index = self.check_cursor(cursor)?;
        if index > self.len {
            return Err(DynArrError::OutOfRange { index, len: self.len });
        }
        Ok(index)
    }

    /// Returns a reference to the element the cursor points at.
    pub fn at_cursor(&self, cursor: Cursor) -> Result<&T, DynArrError> {
        let index = self.check_cursor(cursor)?;
        self.at(index)
    }

    /// Returns a mutable reference to the element the cursor points at.
    pub fn at_cursor_mut(&mut self, cursor: Cursor) -> Result<&mut T, DynArrError> {
        let index = self.check_cursor(cursor)?;
        self.at_mut(index)
    }

    /// Returns a reference to the element the reverse cursor points at.
    pub fn at_rev(&self, cursor: RevCursor) -> Result<&T, DynArrError> {
        let base = self.check_cursor(cursor.base())?;
        match base.checked_sub(1) {
            Some(index) => self.at(index),
            None => Err(DynArrError::OutOfRange { index: base.wrapping_sub(1), len: self.len }),
        }
    }

    //--------------------------------------------------------------

    /// Appends an element to the back of the collection.
    ///
    /// # Errors
    ///
    /// If the dynamic array needs to grow and can't, the error is returned and `value` is dropped.
    ///
    /// # Time complexity
    ///
    /// Takes amortized *O*(1) time.
    #[inline]
    pub fn push(&mut self, value: T) -> Result<(), DynArrError> {
        self.emplace_back(|| value).map(|_| ())
    }

    /// Appends the element produced by `f`, returning a reference to it.
    ///
    /// The dynamic array grows before `f` is called, if `f` panics the length is left unchanged.
    pub fn emplace_back<F>(&mut self, f: F) -> Result<&mut T, DynArrError> where
        F: FnOnce() -> T
    {
        let len = self.len;
        if len == self.arr.capacity() {
            let required = self.required_len(1)?;
            self.arr.try_reserve(len, required)?;
        }

        let slot = self.slot(len);
        let value = f();
        // SAFETY: `len < capacity`, so the slot is in bounds and uninitialized
        unsafe {
            self.arr.allocator_mut().construct(slot, value);
            self.len += 1;
            Ok(&mut *slot.as_ptr())
        }
    }

    /// Removes the last element from a dynamic array and returns it, or [`None`] if it is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// # use nuo_common::prelude::*;
    /// let mut arr = dynarr![1, 2, 3];
    /// assert_eq!(arr.pop(), Some(3));
    /// assert_eq!(arr, [1, 2]);
    /// ```
    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            None
        } else {
            self.len -= 1;
            let slot = self.slot(self.len);
            // SAFETY: The slot held the last live element, and is now outside of `len`
            Some(unsafe { self.arr.allocator_mut().take(slot) })
        }
    }

    /// Destroys the last element of a dynamic array.
    ///
    /// Unlike [`pop`](DynArr::pop), the element is destroyed through the allocator instead of being returned.
    ///
    /// # Errors
    ///
    /// Returns `Empty` if there is no element to remove.
    pub fn pop_back(&mut self) -> Result<(), DynArrError> {
        if self.len == 0 {
            return Err(DynArrError::Empty);
        }
        self.len -= 1;
        let slot = self.slot(self.len);
        // SAFETY: The slot held the last live element, and is now outside of `len`
        unsafe { self.arr.allocator_mut().destroy(slot) };
        Ok(())
    }

    /// Inserts an element in front of `pos`, returning a cursor to it.
    ///
    /// # Examples
    ///
    /// ```
    /// # use nuo_common::prelude::*;
    /// let mut arr = dynarr![1, 2, 3];
    /// let pos = arr.insert(arr.begin() + 1, 99)?;
    /// assert_eq!(arr, [1, 99, 2, 3]);
    /// assert_eq!(arr.at_cursor(pos), Ok(&99));
    /// # Ok::<(), DynArrError>(())
    /// ```
    ///
    /// # Time complexity
    ///
    /// Takes *O*([`DynArr::len`]) time.
    /// All items after the insertion position must be shifted to the right.
    pub fn insert(&mut self, pos: Cursor, value: T) -> Result<Cursor, DynArrError> {
        self.emplace(pos, || value)
    }

    /// Inserts the element produced by `f` in front of `pos`, returning a cursor to it.
    ///
    /// If `f` panics, the dynamic array is restored to its original sequence.
    pub fn emplace<F>(&mut self, pos: Cursor, f: F) -> Result<Cursor, DynArrError> where
        F: FnOnce() -> T
    {
        let index = self.index_of(pos)?;
        let mut gap = GapGuard::open(self, index, 1)?;
        // SAFETY: The gap has room for 1 element
        unsafe { gap.construct(f()) };
        gap.commit();
        Ok(self.cursor(index))
    }

    /// Inserts `count` clones of `value` in front of `pos`, returning a cursor to the first inserted element.
    pub fn insert_n(&mut self, pos: Cursor, count: usize, value: T) -> Result<Cursor, DynArrError> where
        T: Clone
    {
        let index = self.index_of(pos)?;
        let mut gap = GapGuard::open(self, index, count)?;
        for _ in 0..count {
            // SAFETY: Exactly `count` elements are constructed into a gap of `count` slots
            unsafe { gap.construct(value.clone()) };
        }
        gap.commit();
        Ok(self.cursor(index))
    }

    /// Inserts clones of the elements in `src` in front of `pos`, returning a cursor to the first inserted element.
    pub fn insert_slice(&mut self, pos: Cursor, src: &[T]) -> Result<Cursor, DynArrError> where
        T: Clone
    {
        let index = self.index_of(pos)?;
        let mut gap = GapGuard::open(self, index, src.len())?;
        for value in src {
            // SAFETY: Exactly `src.len()` elements are constructed into a gap of `src.len()` slots
            unsafe { gap.construct(value.clone()) };
        }
        gap.commit();
        Ok(self.cursor(index))
    }

    /// Inserts the items of an iterator in front of `pos`, returning a cursor to the first inserted element.
    ///
    /// Iterators reporting an exact size are constructed directly into place,
    /// others are appended to the back first and then rotated into place.
    pub fn insert_iter<I: IntoIterator<Item = T>>(&mut self, pos: Cursor, iter: I) -> Result<Cursor, DynArrError> {
        let index = self.index_of(pos)?;
        let mut iter = iter.into_iter();

        match iter.size_hint() {
            (lower, Some(upper)) if lower == upper => {
                let mut gap = GapGuard::open(self, index, lower)?;
                while gap.filled < gap.gap {
                    match iter.next() {
                        // SAFETY: The gap still has free slots
                        Some(value) => unsafe { gap.construct(value) },
                        None => break,
                    }
                }
                let inserted = gap.commit();

                // Anything the iterator yields beyond its size hint is rotated in after the committed elements,
                // which are erased again if that fails
                let mut this = scopeguard::guard(self, |arr| {
                    if inserted > 0 {
                        common_log!(log_verbose, "rolling back the insertion of {} elements", inserted);
                        arr.erase_unchecked(index, index + inserted);
                    }
                });
                this.insert_by_rotation(index + inserted, iter)?;
                Ok(ScopeGuard::into_inner(this).cursor(index))
            },
            _ => {
                self.insert_by_rotation(index, iter)?;
                Ok(self.cursor(index))
            },
        }
    }

    /// Removes the element at `pos`, returning a cursor to the element that followed it.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` when `pos` does not point at an element.
    pub fn erase(&mut self, pos: Cursor) -> Result<Cursor, DynArrError> {
        let index = self.check_cursor(pos)?;
        if index >= self.len {
            return Err(DynArrError::OutOfRange { index, len: self.len });
        }
        self.erase_unchecked(index, index + 1);
        Ok(self.cursor(index))
    }

    /// Removes the elements in `first..last`, returning a cursor to the element that followed them.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when `first` lies after `last`, and `OutOfRange` when `last` lies past the end.
    ///
    /// # Examples
    ///
    /// ```
    /// # use nuo_common::prelude::*;
    /// let mut arr = dynarr![1, 99, 2, 3];
    /// arr.erase_range(arr.begin(), arr.begin() + 2)?;
    /// assert_eq!(arr, [2, 3]);
    /// # Ok::<(), DynArrError>(())
    /// ```
    pub fn erase_range(&mut self, first: Cursor, last: Cursor) -> Result<Cursor, DynArrError> {
        let start = self.check_cursor(first)?;
        let end = self.check_cursor(last)?;
        if start > end {
            return Err(DynArrError::InvalidArgument { reason: "the start of the range lies after its end" });
        }
        if end > self.len {
            return Err(DynArrError::OutOfRange { index: end, len: self.len });
        }
        if start == end {
            return Ok(first);
        }
        self.erase_unchecked(start, end);
        Ok(self.cursor(start))
    }

    /// Removes and returns the element at position `index` within the dynamic array, shifting all elements after it to the left.
    ///
    /// Note: Because this shifts over the remaining elements, it has a worst-case performance of *O*(*n*).
    pub fn remove(&mut self, index: usize) -> Result<T, DynArrError> {
        let len = self.len;
        if index >= len {
            return Err(DynArrError::OutOfRange { index, len });
        }
        unsafe {
            // the place we are taking from
            let ptr = self.arr.ptr().add(index);
            // move it out, the slot stays uninitialized until the tail is shifted over it
            let value = self.arr.allocator_mut().take(NonNull::new_unchecked(ptr));
            // Shift everything down to fill in that spot
            ptr::copy(ptr.add(1), ptr, len - index - 1);
            self.len = len - 1;
            self.arr.renew_id();
            Ok(value)
        }
    }

    /// Appends the items of an iterator to the back.
    ///
    /// If growing fails, or the iterator panics, all items appended by this call are destroyed again.
    pub fn append_range<I: IntoIterator<Item = T>>(&mut self, iter: I) -> Result<(), DynArrError> {
        let iter = iter.into_iter();
        let (lower, _) = iter.size_hint();
        let required = self.required_len(lower)?;
        self.reserve(required)?;

        let len = self.len;
        let mut arr = scopeguard::guard(self, |arr| {
            if std::thread::panicking() {
                common_log!(log_verbose, "rolling back {} appended elements", arr.len - len);
            }
            arr.truncate(len);
        });
        for value in iter {
            arr.push(value)?;
        }
        ScopeGuard::into_inner(arr);
        Ok(())
    }

    /// Clones and appends all elements in a slice to the dynamic array.
    pub fn extend_from_slice(&mut self, other: &[T]) -> Result<(), DynArrError> where
        T: Clone
    {
        let required = self.required_len(other.len())?;
        self.reserve(required)?;
        self.extend_within_capacity(other.iter().cloned());
        Ok(())
    }

    /// Exchange the contents of 2 dynamic arrays, including their buffer identities.
    ///
    /// Allocators are exchanged as well when they propagate on swap.
    ///
    /// # Errors
    ///
    /// Returns `IncompatibleAllocators`, without changing either array, when the allocators don't propagate and are not equal.
    pub fn swap_with(&mut self, other: &mut Self) -> Result<(), DynArrError> {
        if A::PROPAGATE_ON_SWAP {
            mem::swap(&mut self.arr, &mut other.arr);
        } else if allocators_equal(self.arr.allocator(), other.arr.allocator()) {
            self.arr.swap_buffers(&mut other.arr);
        } else {
            common_log!(log_error, "cannot swap dynamic arrays with unequal allocators that don't propagate on swap");
            return Err(DynArrError::IncompatibleAllocators);
        }
        mem::swap(&mut self.len, &mut other.len);
        Ok(())
    }

    //--------------------------------------------------------------

    #[inline]
    fn slot(&self, index: usize) -> NonNull<T> {
        // SAFETY: `ptr` is never null, and callers stay within the buffer (or one past it)
        unsafe { NonNull::new_unchecked(self.arr.ptr().add(index)) }
    }

    #[inline]
    fn cursor(&self, offset: usize) -> Cursor {
        Cursor::new(self.arr.id(), offset)
    }

    fn check_cursor(&self, cursor: Cursor) -> Result<usize, DynArrError> {
        if cursor.buffer() == self.arr.id() {
            Ok(cursor.offset())
        } else {
            Err(DynArrError::InvalidatedCursor)
        }
    }

    fn required_len(&self, additional: usize) -> Result<usize, DynArrError> {
        self.len.checked_add(additional).ok_or(DynArrError::LengthExceeded {
            requested: self.len.saturating_add(additional),
            max: self.max_size(),
        })
    }

    /// Construct items from `iter` into the spare capacity, until either runs out.
    fn extend_within_capacity<I: Iterator<Item = T>>(&mut self, iter: I) -> usize {
        let spare = self.arr.capacity() - self.len;
        let base = self.slot(self.len).as_ptr();
        // SAFETY: `base` is followed by `spare` uninitialized slots of our buffer
        let mut guard = unsafe { InitGuard::new(self.arr.allocator_mut(), base) };
        for value in iter.take(spare) {
            // SAFETY: At most `spare` elements are constructed
            unsafe { guard.construct(value) };
        }
        let added = guard.commit();
        self.len += added;
        added
    }

    /// Destroy all elements and replace the buffer by one of exactly `capacity` slots.
    fn reset_with_capacity(&mut self, capacity: usize) -> Result<(), DynArrError> {
        self.clear();
        self.arr.release();
        self.arr.try_reserve_exact(0, capacity)
    }

    /// Move all elements of `other` into our spare capacity, `self` needs to be empty.
    fn relocate_from(&mut self, other: &mut Self) {
        debug_assert!(self.len == 0 && self.arr.capacity() >= other.len);
        let count = mem::take(&mut other.len);
        for i in 0..count {
            let (src, dst) = (other.slot(i), self.slot(i));
            // SAFETY: Both buffers are distinct and large enough, and `other` no longer owns its first `count` slots
            unsafe {
                let value = other.arr.allocator_mut().take(src);
                self.arr.allocator_mut().construct(dst, value);
            }
            self.len += 1;
        }
    }

    /// Append the items of `iter` and rotate them in front of `index`.
    fn insert_by_rotation<I: Iterator<Item = T>>(&mut self, index: usize, iter: I) -> Result<(), DynArrError> {
        let len = self.len;
        self.append_range(iter)?;
        let added = self.len - len;
        if added > 0 {
            self.as_mut_slice()[index..].rotate_right(added);
            self.arr.renew_id();
        }
        Ok(())
    }

    fn erase_unchecked(&mut self, start: usize, end: usize) {
        debug_assert!(start < end && end <= self.len);

        // DynArr: [Kept, Kept, Destroyed, Destroyed, Unchecked, Tail, Tail]
        //                     |<-  start..end  ->|
        // Shifting the tail down happens on drop, so it still happens when a destructor panics.
        struct BackshiftOnDrop<'a, T, A: Allocator, R: ReserveStrategy> {
            arr:   &'a mut DynArr<T, A, R>,
            start: usize,
            end:   usize,
            tail:  usize,
        }

        impl<T, A: Allocator, R: ReserveStrategy> Drop for BackshiftOnDrop<'_, T, A, R> {
            fn drop(&mut self) {
                // SAFETY: The tail is still initialized, and the destination slots were destroyed
                unsafe {
                    let ptr = self.arr.arr.ptr();
                    ptr::copy(ptr.add(self.end), ptr.add(self.start), self.tail);
                }
                self.arr.len = self.start + self.tail;
            }
        }

        let tail = self.len - end;
        self.len = start;
        self.arr.renew_id();

        let mut guard = BackshiftOnDrop { arr: self, start, end, tail };
        for index in start..end {
            let slot = guard.arr.slot(index);
            // SAFETY: Each slot in the range is destroyed exactly once, and is outside of `len`
            unsafe { guard.arr.arr.allocator_mut().destroy(slot) };
        }
    }
}

impl<T, A: Allocator + Clone, R: ReserveStrategy> DynArr<T, A, R> {
    /// Clone the dynamic array, including its allocator.
    pub fn try_clone(&self) -> Result<Self, DynArrError> where
        T: Clone
    {
        self.try_clone_in(self.arr.allocator().clone())
    }

    /// Take the elements and buffer of `other`, leaving it empty with a clone of its allocator.
    ///
    /// # Examples
    ///
    /// ```
    /// # use nuo_common::prelude::*;
    /// let mut src = dynarr![1, 2, 3];
    /// let dst = DynArr::move_from(&mut src);
    /// assert_eq!(dst, [1, 2, 3]);
    /// assert!(src.is_empty());
    /// ```
    pub fn move_from(other: &mut Self) -> Self {
        let empty = Self::new_in(other.arr.allocator().clone());
        mem::replace(other, empty)
    }
}

//------------------------------------------------------------------------------------------------------------------------------

/// Open gap in the middle of a dynamic array, elements are constructed into it from front to back.
///
/// Committing closes whatever part of the gap was not filled.
/// Dropping without committing destroys the constructed elements and restores the original sequence.
struct GapGuard<'a, T, A: Allocator, R: ReserveStrategy> {
    arr:    &'a mut DynArr<T, A, R>,
    pos:    usize,
    gap:    usize,
    filled: usize,
    tail:   usize,
}

impl<'a, T, A: Allocator, R: ReserveStrategy> GapGuard<'a, T, A, R> {
    fn open(arr: &'a mut DynArr<T, A, R>, pos: usize, gap: usize) -> Result<Self, DynArrError> {
        debug_assert!(pos <= arr.len);
        let required = arr.required_len(gap)?;
        arr.reserve(required)?;

        let tail = arr.len - pos;
        if gap > 0 {
            // SAFETY: The buffer can hold `len + gap` elements
            unsafe {
                let ptr = arr.arr.ptr().add(pos);
                ptr::copy(ptr, ptr.add(gap), tail);
            }
            arr.arr.renew_id();
        }
        // Everything from `pos` onwards is owned by the guard until it closes
        arr.len = pos;
        Ok(Self { arr, pos, gap, filled: 0, tail })
    }

    /// # Safety
    ///
    /// The gap must not be filled yet.
    unsafe fn construct(&mut self, value: T) {
        debug_assert!(self.filled < self.gap);
        let slot = self.arr.slot(self.pos + self.filled);
        self.arr.arr.allocator_mut().construct(slot, value);
        self.filled += 1;
    }

    fn close(&mut self) {
        let end = self.pos + self.filled;
        if self.filled != self.gap {
            // SAFETY: Moves the tail directly behind the constructed elements
            unsafe {
                let ptr = self.arr.arr.ptr();
                ptr::copy(ptr.add(self.pos + self.gap), ptr.add(end), self.tail);
            }
        }
        self.arr.len = end + self.tail;
    }

    fn commit(mut self) -> usize {
        self.close();
        let filled = self.filled;
        mem::forget(self);
        filled
    }
}

impl<T, A: Allocator, R: ReserveStrategy> Drop for GapGuard<'_, T, A, R> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            common_log!(log_verbose, "rolling back the insertion of {} elements", self.filled);
        }
        while self.filled > 0 {
            self.filled -= 1;
            let slot = self.arr.slot(self.pos + self.filled);
            // SAFETY: The slot was constructed by this guard
            unsafe { self.arr.arr.allocator_mut().destroy(slot) };
        }
        self.close();
    }
}

//------------------------------------------------------------------------------------------------------------------------------

/// Create a dynamic array holding `n` clones of `elem`, used by `dynarr![elem; n]`.
///
/// # Panics
///
/// Panics if the dynamic array could not be allocated.
pub fn from_elem<T: Clone>(elem: T, n: usize) -> DynArr<T> {
    DynArr::with_value(n, elem).unwrap_or_else(|err| handle_error(err))
}

#[doc(hidden)]
pub fn from_array<T, const N: usize>(array: [T; N]) -> DynArr<T> {
    DynArr::from(array)
}

//------------------------------------------------------------------------------------------------------------------------------

impl<T, A: Allocator, R: ReserveStrategy> ops::Deref for DynArr<T, A, R> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &Self::Target {
        unsafe { slice::from_raw_parts(self.arr.ptr(), self.len) }
    }
}

impl<T, A: Allocator, R: ReserveStrategy> ops::DerefMut for DynArr<T, A, R> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { slice::from_raw_parts_mut(self.arr.ptr(), self.len) }
    }
}

impl<T: Clone, A: Allocator + Clone, R: ReserveStrategy> Clone for DynArr<T, A, R> {
    /// # Panics
    ///
    /// Panics if the new dynamic array could not be allocated.
    fn clone(&self) -> Self {
        self.try_clone().unwrap_or_else(|err| handle_error(err))
    }

    /// Overwrites the contents of `self` with a clone of the contents of `source`.
    ///
    /// This method is preferred over simply assigning `source.clone()` to `self`, as it avoids reallocation if possible.
    /// Additionally, if the element type `T` overrides `clone_from()`, this will reuse the resources of `self`'s element as well.
    fn clone_from(&mut self, source: &Self) {
        if let Err(err) = self.assign_from(source) {
            handle_error(err);
        }
    }
}

impl<T: Hash, A: Allocator, R: ReserveStrategy> Hash for DynArr<T, A, R> {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        Hash::hash(&**self, state)
    }
}

impl<T, I: SliceIndex<[T]>, A: Allocator, R: ReserveStrategy> Index<I> for DynArr<T, A, R> {
    type Output = I::Output;

    fn index(&self, index: I) -> &Self::Output {
        Index::index(&**self, index)
    }
}

impl<T, I: SliceIndex<[T]>, A: Allocator, R: ReserveStrategy> IndexMut<I> for DynArr<T, A, R> {
    fn index_mut(&mut self, index: I) -> &mut Self::Output {
        IndexMut::index_mut(&mut **self, index)
    }
}

/// Collects an iterator into a DynArr, commonly called via [`Iterator::collect()`].
///
/// # Panics
///
/// Panics if the dynamic array could not grow.
impl<T, A: Allocator + Default, R: ReserveStrategy> FromIterator<T> for DynArr<T, A, R> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_iter_in(iter, A::default()).unwrap_or_else(|err| handle_error(err))
    }
}

impl<T, A: Allocator, R: ReserveStrategy> IntoIterator for DynArr<T, A, R> {
    type Item = T;
    type IntoIter = IntoIter<T, A, R>;

    /// Creates a consuming iterator, that is, one that moves each value out of the dynamic array (from start to end).
    /// The dynamic array cannot be used after calling this.
    fn into_iter(self) -> Self::IntoIter {
        let this = ManuallyDrop::new(self);
        // SAFETY: `this` is never used or dropped again, so the buffer is moved out exactly once
        let arr = unsafe { ptr::read(&this.arr) };
        IntoIter { arr, start: 0, end: this.len }
    }
}

impl<'a, T, A: Allocator, R: ReserveStrategy> IntoIterator for &'a DynArr<T, A, R> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T, A: Allocator, R: ReserveStrategy> IntoIterator for &'a mut DynArr<T, A, R> {
    type Item = &'a mut T;
    type IntoIter = slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<T, A: Allocator, R: ReserveStrategy> Extend<T> for DynArr<T, A, R> {
    /// # Panics
    ///
    /// Panics if the dynamic array could not grow, in which case none of the items are added.
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        if let Err(err) = self.append_range(iter) {
            handle_error(err);
        }
    }
}

/// Extend implementation that copies elements out of references before pushing them onto the DynArr.
impl<'a, T: Copy + 'a, A: Allocator, R: ReserveStrategy> Extend<&'a T> for DynArr<T, A, R> {
    fn extend<I: IntoIterator<Item = &'a T>>(&mut self, iter: I) {
        self.extend(iter.into_iter().copied())
    }
}

impl_slice_partial_eq_generic!([A0: Allocator, A1: Allocator, R0: ReserveStrategy, R1: ReserveStrategy] DynArr<T, A0, R0>, DynArr<U, A1, R1>);
impl_slice_partial_eq_generic!([A: Allocator, R: ReserveStrategy] DynArr<T, A, R>, &[U]);
impl_slice_partial_eq_generic!([A: Allocator, R: ReserveStrategy] DynArr<T, A, R>, &mut [U]);
impl_slice_partial_eq_generic!([A: Allocator, R: ReserveStrategy] &[T], DynArr<U, A, R>);
impl_slice_partial_eq_generic!([A: Allocator, R: ReserveStrategy] &mut [T], DynArr<U, A, R>);
impl_slice_partial_eq_generic!([A: Allocator, R: ReserveStrategy] DynArr<T, A, R>, [U]);
impl_slice_partial_eq_generic!([A: Allocator, R: ReserveStrategy] [T], DynArr<U, A, R>);
impl_slice_partial_eq_generic!([A: Allocator, R: ReserveStrategy, const N: usize] DynArr<T, A, R>, [U; N]);
impl_slice_partial_eq_generic!([A: Allocator, R: ReserveStrategy, const N: usize] [T; N], DynArr<U, A, R>);

impl<T, A0, A1, R0, R1> PartialOrd<DynArr<T, A1, R1>> for DynArr<T, A0, R0> where
    T: PartialOrd,
    A0: Allocator,
    A1: Allocator,
    R0: ReserveStrategy,
    R1: ReserveStrategy
{
    #[inline]
    fn partial_cmp(&self, other: &DynArr<T, A1, R1>) -> Option<cmp::Ordering> {
        PartialOrd::partial_cmp(&**self, &**other)
    }
}

impl<T: Eq, A: Allocator, R: ReserveStrategy> Eq for DynArr<T, A, R> {}

impl<T: Ord, A: Allocator, R: ReserveStrategy> Ord for DynArr<T, A, R> {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        Ord::cmp(&**self, &**other)
    }
}

impl<T, A: Allocator, R: ReserveStrategy> Drop for DynArr<T, A, R> {
    fn drop(&mut self) {
        self.clear();
        // RawArray handles deallocation
    }
}

impl<T, A: Allocator + Default, R: ReserveStrategy> Default for DynArr<T, A, R> {
    /// Creates an empty `DynArr<T>`.
    ///
    /// The dynamic array will not allocate until elements are pushed onto it.
    fn default() -> Self {
        Self::new_in(A::default())
    }
}

impl<T: fmt::Debug, A: Allocator, R: ReserveStrategy> fmt::Debug for DynArr<T, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T, A: Allocator, R: ReserveStrategy> AsRef<[T]> for DynArr<T, A, R> {
    fn as_ref(&self) -> &[T] {
        self
    }
}

impl<T, A: Allocator, R: ReserveStrategy> AsMut<[T]> for DynArr<T, A, R> {
    fn as_mut(&mut self) -> &mut [T] {
        self
    }
}

impl<T: Clone, A: Allocator + Default, R: ReserveStrategy> From<&[T]> for DynArr<T, A, R> {
    /// Allocate a `DynArr<T>` and fill it by cloning `s`'s items.
    fn from(s: &[T]) -> Self {
        Self::from_slice_in(s, A::default()).unwrap_or_else(|err| handle_error(err))
    }
}

impl<T, A: Allocator + Default, R: ReserveStrategy, const N: usize> From<[T; N]> for DynArr<T, A, R> {
    /// Allocate a `DynArr<T>` and move the items of `array` into it.
    fn from(array: [T; N]) -> Self {
        let mut arr = Self::with_capacity_in(N, A::default()).unwrap_or_else(|err| handle_error(err));
        arr.extend_within_capacity(array.into_iter());
        arr
    }
}

//------------------------------------------------------------------------------------------------------------------------------

/// Creates a [`DynArr`] containing the arguments.
///
/// - Create a [`DynArr`] containing a given list of elements: `dynarr![1, 2, 3]`
/// - Create a [`DynArr`] from a given element and size: `dynarr![1; 3]`, the element needs to implement [`Clone`]
///
/// # Panics
///
/// Panics if the dynamic array could not be allocated.
#[macro_export]
macro_rules! dynarr {
    () => (
        $crate::collections::DynArr::new()
    );
    ($elem:expr; $n:expr) => (
        $crate::collections::from_elem($elem, $n)
    );
    ($($x:expr),+ $(,)?) => (
        $crate::collections::from_array([$($x),+])
    );
}

#[cfg(test)]
mod tests;
