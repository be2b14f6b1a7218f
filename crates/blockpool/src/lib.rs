//! # blockpool
//!
//! Fixed-block pool allocators: O(1) allocation and deallocation of single
//! objects of one type, with backing allocations amortized across many
//! logical allocations.
//!
//! - [`PoolAllocator`]: growable arena of geometrically sized pages with an
//!   intrusive free list, trailing-block reclamation and a reservation
//!   protocol for callers that know a batch size in advance
//! - [`FixedPoolAllocator`]: inline buffer of `CAPACITY` blocks that never
//!   touches the heap and fails on overflow
//!
//! ## Quick Start
//!
//! ```rust
//! use blockpool::prelude::*;
//!
//! # fn main() -> PoolResult<()> {
//! let mut pool = PoolAllocator::<u64>::new();
//! let block = pool.allocate(1)?;
//! unsafe {
//!     block.as_ptr().write(42);
//!     assert_eq!(*block.as_ptr(), 42);
//!     pool.deallocate(block, 1)?;
//! }
//!
//! // Pre-build room for a batch, then fill it without hitting the heap
//! let first = pool.allocate(1)?;
//! pool.reserve(16)?;
//! # unsafe { pool.deallocate(first, 1)?; }
//! # Ok(())
//! # }
//! ```
//!
//! ## Contract checks
//!
//! Caller bugs (a count other than one, freeing a foreign pointer, reserving
//! before the first allocation) are checked according to a [`Contract`]
//! policy type: [`Checked`], [`Unchecked`] or [`DebugChecked`] (the default,
//! checked in debug builds only). Resource exhaustion is always reported.
//!
//! ## Features
//!
//! - `logging` (default): `tracing` events for page growth, release and
//!   reservation

#![allow(unsafe_code)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(rust_2018_idioms)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]
// Precision loss in usize -> f64 casts is acceptable for stats
#![allow(clippy::cast_precision_loss)]
// inline(always) on contract helpers keeps unchecked policies branch-free
#![allow(clippy::inline_always)]
// Capability flags are a plain bag of bools
#![allow(clippy::struct_excessive_bools)]

pub mod error;

pub mod block;
pub mod config;
pub mod contract;
pub mod fixed;
mod page;
pub mod pool;
pub mod source;
pub mod stats;
pub mod traits;

pub use crate::block::{block_align, block_size};
pub use crate::config::ArenaConfig;
pub use crate::contract::{Checked, Contract, DebugChecked, Unchecked};
pub use crate::error::{PoolError, PoolResult};
pub use crate::fixed::FixedPoolAllocator;
pub use crate::pool::PoolAllocator;
pub use crate::source::{GlobalPageSource, PageSource};
pub use crate::stats::PoolStats;
pub use crate::traits::{AllocatorTraits, BlockAllocator, Reservable, Resettable};

pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::config::ArenaConfig;
    pub use crate::contract::{Checked, Contract, DebugChecked, Unchecked};
    pub use crate::error::{PoolError, PoolResult};
    pub use crate::fixed::FixedPoolAllocator;
    pub use crate::pool::PoolAllocator;
    pub use crate::source::{GlobalPageSource, PageSource};
    pub use crate::stats::PoolStats;
    pub use crate::traits::{AllocatorTraits, BlockAllocator, Reservable, Resettable};
}
