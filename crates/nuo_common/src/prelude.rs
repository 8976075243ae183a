pub use crate::alloc::{Allocator, AllocError, Mallocator};
pub use crate::collections::{
    Cursor,
    DynArr,
    DynArrError,
    ReserveStrategy,
    RevCursor,
};
pub use crate::dynarr;
