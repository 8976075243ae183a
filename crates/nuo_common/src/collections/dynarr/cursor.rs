use core::{
    cmp::Ordering,
    fmt,
    ops::{Add, AddAssign, Sub, SubAssign},
};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique identity of one incarnation of a buffer.
///
/// A dynamic array gets a new identity whenever it reallocates or shifts its elements, which invalidates all cursors taken before.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct BufferId(u64);

impl BufferId {
    pub(crate) fn new() -> Self {
        Self(NEXT_BUFFER_ID.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

//------------------------------------------------------------------------------------------------------------------------------

/// A position inside a dynamic array.
///
/// A cursor does not borrow the array, it only remembers the identity of the buffer it was taken from and an offset in it.
/// Passing a cursor to an array whose buffer has changed since results in [`DynArrError::InvalidatedCursor`].
///
/// Arithmetic wraps, so stepping a cursor outside of the array is only detected once it is used.
///
/// [`DynArrError::InvalidatedCursor`]: crate::collections::DynArrError::InvalidatedCursor
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cursor {
    buffer: BufferId,
    offset: usize,
}

impl Cursor {
    pub(crate) const fn new(buffer: BufferId, offset: usize) -> Self {
        Self { buffer, offset }
    }

    /// Identity of the buffer this cursor points into.
    pub const fn buffer(&self) -> BufferId {
        self.buffer
    }

    /// Offset from the start of the array.
    pub const fn offset(&self) -> usize {
        self.offset
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cursor({}@{})", self.offset, self.buffer.0)
    }
}

impl Add<usize> for Cursor {
    type Output = Cursor;

    fn add(self, rhs: usize) -> Self::Output {
        Cursor { buffer: self.buffer, offset: self.offset.wrapping_add(rhs) }
    }
}

impl Sub<usize> for Cursor {
    type Output = Cursor;

    fn sub(self, rhs: usize) -> Self::Output {
        Cursor { buffer: self.buffer, offset: self.offset.wrapping_sub(rhs) }
    }
}

impl AddAssign<usize> for Cursor {
    fn add_assign(&mut self, rhs: usize) {
        *self = *self + rhs;
    }
}

impl SubAssign<usize> for Cursor {
    fn sub_assign(&mut self, rhs: usize) {
        *self = *self - rhs;
    }
}

impl Sub for Cursor {
    type Output = isize;

    /// Distance between 2 cursors.
    ///
    /// # Panics
    ///
    /// Panics if the cursors point into different buffers.
    #[track_caller]
    fn sub(self, rhs: Self) -> Self::Output {
        assert_eq!(self.buffer, rhs.buffer, "cannot take the distance between cursors into different buffers");
        (self.offset as isize).wrapping_sub(rhs.offset as isize)
    }
}

impl PartialOrd for Cursor {
    /// Cursors into different buffers are incomparable.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.buffer == other.buffer {
            Some(self.offset.cmp(&other.offset))
        } else {
            None
        }
    }
}

//------------------------------------------------------------------------------------------------------------------------------

/// A position inside a dynamic array, walking from back to front.
///
/// Like a reverse iterator, it wraps a [`Cursor`] to the element *after* the one it refers to,
/// so `rbegin()` wraps `end()` and refers to the last element.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct RevCursor {
    base: Cursor,
}

impl RevCursor {
    pub const fn new(base: Cursor) -> Self {
        Self { base }
    }

    /// The underlying forward cursor.
    pub const fn base(&self) -> Cursor {
        self.base
    }
}

impl Add<usize> for RevCursor {
    type Output = RevCursor;

    fn add(self, rhs: usize) -> Self::Output {
        RevCursor { base: self.base - rhs }
    }
}

impl Sub<usize> for RevCursor {
    type Output = RevCursor;

    fn sub(self, rhs: usize) -> Self::Output {
        RevCursor { base: self.base + rhs }
    }
}

impl AddAssign<usize> for RevCursor {
    fn add_assign(&mut self, rhs: usize) {
        self.base -= rhs;
    }
}

impl SubAssign<usize> for RevCursor {
    fn sub_assign(&mut self, rhs: usize) {
        self.base += rhs;
    }
}

impl Sub for RevCursor {
    type Output = isize;

    #[track_caller]
    fn sub(self, rhs: Self) -> Self::Output {
        rhs.base - self.base
    }
}

impl PartialOrd for RevCursor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        other.base.partial_cmp(&self.base)
    }
}
