//! Generic containers over a pluggable allocator capability.
//!
//! The central type is [`collections::DynArr`], a growable contiguous array that routes every
//! allocation, construction and destruction through an [`alloc::Allocator`], consults a
//! [`collections::ReserveStrategy`] when it needs to grow, and rolls back partially completed
//! bulk operations so a failing mutation never leaves the array in an inconsistent state.

#[macro_use]
mod logging;

pub mod alloc;
pub mod collections;
pub mod prelude;
