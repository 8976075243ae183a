//! Allocator-aware containers.
//!
//! This crate bundles the workspace crates behind one dependency:
//! - [`common`]: the allocator capability, reserve strategies and [`DynArr`](common::collections::DynArr)
//! - [`logging`]: the category based logger the containers report through
//!
//! ```
//! use nuostl::prelude::*;
//!
//! let mut arr = dynarr![1, 2, 3];
//! let pos = arr.insert(arr.begin() + 1, 99)?;
//! assert_eq!(arr, [1, 99, 2, 3]);
//!
//! arr.erase(pos)?;
//! assert_eq!(arr, [1, 2, 3]);
//! # Ok::<(), DynArrError>(())
//! ```

pub use nuo_common as common;
pub use nuo_logging as logging;

pub mod prelude {
    pub use nuo_common::prelude::*;
    pub use nuo_logging::{set_logger, LogCategory, LogLevel, Logger};
}
