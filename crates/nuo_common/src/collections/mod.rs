pub(crate) mod imp;

mod dynarr;

use crate::alloc::AllocError;

pub use dynarr::*;
pub use crate::dynarr;

//--------------------------------------------------------------

macro_rules! impl_slice_partial_eq_generic {
    ([$($vars:tt)*] $lhs:ty, $rhs:ty $(where $ty:ty: $bound:ident)?) => {
        impl<T, U, $($vars)*> PartialEq<$rhs> for $lhs  where
            T : PartialEq<U>,
            $($ty: $bound)?
        {
            #[inline]
            fn eq(&self, other: &$rhs) -> bool { self[..] == other[..] }
            #[inline]
            fn ne(&self, other: &$rhs) -> bool { self[..] != other[..] }
        }
    };
}
use impl_slice_partial_eq_generic;

//--------------------------------------------------------------

/// Errors returned by the fallible operations of the collections
#[derive(Clone, Copy, PartialEq, Eq, Debug, thiserror::Error)]
pub enum DynArrError {
    /// An argument was invalid, e.g. an inverted range
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: &'static str },
    /// An index or position lies outside of the valid range
    #[error("index {index} is out of range for a length of {len}")]
    OutOfRange { index: usize, len: usize },
    /// The requested number of elements can never fit in the collection
    #[error("requested length {requested} exceeds the maximum length of {max}")]
    LengthExceeded { requested: usize, max: usize },
    /// The collection contains no elements
    #[error("the collection is empty")]
    Empty,
    /// The allocator could not provide the memory
    #[error(transparent)]
    Alloc(#[from] AllocError),
    /// The allocators of both collections cannot free each other's memory
    #[error("allocators are neither equal nor propagated")]
    IncompatibleAllocators,
    /// The cursor belongs to another buffer, or to a buffer that has since been reallocated or shifted
    #[error("the cursor has been invalidated")]
    InvalidatedCursor,
}

/// Central function for the error handling of the panicking convenience paths (`Clone`, `Extend`, `FromIterator`, ...)
#[cold]
#[track_caller]
pub(crate) fn handle_error(err: DynArrError) -> ! {
    panic!("{err}");
}

//--------------------------------------------------------------

/// A trait used to define a strategy to reserve additional memory for containers.
pub trait ReserveStrategy {
    /// Calculate the new capacity for a container.
    ///
    /// `cur_capacity` represents the current capacity of the container.
    ///
    /// `min_capacity` represents the minimum required capacity to be able to resize.
    ///
    /// Returns `None` if the capacity were to overflow.
    /// Containers clamp the result to their maximum capacity.
    fn calculate(cur_capacity: usize, min_capacity: usize) -> Option<usize>;
}

/// A reserve strategy that will try to either return double the current capacity, or the minimum required capacity, whichever is bigger.
pub struct DoubleOrMinReserveStrategy;

impl ReserveStrategy for DoubleOrMinReserveStrategy {
    fn calculate(cur_capacity: usize, min_capacity: usize) -> Option<usize> {
        let double_cap = cur_capacity.checked_mul(2)?;
        Some(if double_cap > min_capacity { double_cap } else { min_capacity })
    }
}

/// A reserve strategy that will return a power of 2 capacity
pub struct Pow2ReserveStrategy;

impl ReserveStrategy for Pow2ReserveStrategy {
    fn calculate(_cur_capacity: usize, min_capacity: usize) -> Option<usize> {
        min_capacity.checked_next_power_of_two()
    }
}

/// A reserve stategy that grows the capacity by 1.5
pub struct ThreeHalvesReserveStrategy;

impl ReserveStrategy for ThreeHalvesReserveStrategy {
    fn calculate(cur_capacity: usize, min_capacity: usize) -> Option<usize> {
        // Growing 0 or 1 by 1.5 would never make progress
        let mut cap = cur_capacity.max(2);
        while cap < min_capacity {
            cap = cap.checked_add(cap >> 1)?;
        }
        Some(cap)
    }
}

/// A reserve strategy that only ever reserves the exact capacity that is needed
pub struct ExactReserveStrategy;

impl ReserveStrategy for ExactReserveStrategy {
    fn calculate(_cur_capacity: usize, min_capacity: usize) -> Option<usize> {
        Some(min_capacity)
    }
}
