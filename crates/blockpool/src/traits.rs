//! Allocator traits consumed by containers
//!
//! - [`BlockAllocator`]: the single-object allocate/deallocate pair plus
//!   the type-level [`AllocatorTraits`] flags
//! - [`Reservable`]: optional pre-reservation of capacity
//! - [`Resettable`]: optional release of all memory at once
//!
//! A container that wants `reserve` or `reset` asks for them through trait
//! bounds, so the capability check happens at compile time.

use core::ptr::NonNull;

use crate::error::PoolResult;

/// Type-level capability flags of an allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatorTraits {
    /// Any two instances are interchangeable (false for stateful pools)
    pub is_always_equal: bool,
    /// The allocator follows its container on copy assignment
    pub propagate_on_container_copy: bool,
    /// The allocator follows its container on move assignment
    pub propagate_on_container_move: bool,
    /// The allocator is swapped together with its container
    pub propagate_on_container_swap: bool,
    /// More than one object per allocate/deallocate call
    pub supports_multiple_objects: bool,
    /// The allocator implements [`Reservable`]
    pub supports_reserve: bool,
    /// The allocator implements [`Resettable`]
    pub supports_reset: bool,
}

/// Fixed-block allocator operating on exactly one element per call
///
/// # Examples
///
/// ```rust
/// use blockpool::{BlockAllocator, PoolAllocator};
///
/// # fn main() -> blockpool::PoolResult<()> {
/// let mut pool = PoolAllocator::<u64>::new();
/// let block = pool.allocate(1)?;
/// unsafe {
///     block.as_ptr().write(7);
///     pool.deallocate(block, 1)?;
/// }
/// # Ok(())
/// # }
/// ```
pub trait BlockAllocator {
    /// Element type every block is sized for
    type Value;

    /// Capability flags read by containers
    const TRAITS: AllocatorTraits;

    /// Returns storage for one element
    ///
    /// The memory is uninitialized. `count` must be 1.
    ///
    /// # Errors
    ///
    /// - resource exhaustion is always reported
    /// - a `count` other than 1 is reported under a checked contract policy
    fn allocate(&mut self, count: usize) -> PoolResult<NonNull<Self::Value>>;

    /// Returns a block to the allocator
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    /// - `ptr` was returned by `allocate` on this allocator
    /// - `ptr` has not been deallocated since
    /// - any element written to the block has been dropped or moved out
    ///
    /// # Errors
    ///
    /// Contract violations (`count` other than 1, foreign or already freed
    /// pointers) are reported under a checked contract policy; the allocator
    /// is unchanged.
    unsafe fn deallocate(&mut self, ptr: NonNull<Self::Value>, count: usize) -> PoolResult<()>;
}

/// Allocator that can pre-build capacity for a known batch
pub trait Reservable: BlockAllocator {
    /// Ensures at least `count` more blocks can be allocated without a
    /// backing allocation
    fn reserve(&mut self, count: usize) -> PoolResult<()>;
}

/// Allocator that can release all of its memory at once
pub trait Resettable: BlockAllocator {
    /// Releases every page and returns to the freshly constructed state
    ///
    /// Every pointer handed out before the call dangles afterwards.
    fn reset(&mut self);
}
