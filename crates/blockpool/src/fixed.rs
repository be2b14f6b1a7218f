//! Fixed-capacity inline pool
//!
//! All blocks live in a buffer embedded in the pool itself, so the pool never
//! touches the heap. Handed-out blocks point into that buffer, which is why
//! the allocator operations are only reachable through `Pin<&mut Self>`: once
//! pinned, the buffer cannot move while blocks are live.
//!
//! ```rust
//! use core::pin::pin;
//! use blockpool::{BlockAllocator, FixedPoolAllocator, PoolError};
//!
//! let mut pool = pin!(FixedPoolAllocator::<u64, 2>::new());
//! let a = pool.allocate(1).unwrap();
//! let _b = pool.allocate(1).unwrap();
//! assert_eq!(pool.allocate(1), Err(PoolError::CapacityExceeded { capacity: 2 }));
//!
//! unsafe { pool.deallocate(a, 1).unwrap() };
//! assert_eq!(pool.remaining(), 1);
//! ```

use core::cell::UnsafeCell;
use core::fmt;
use core::marker::{PhantomData, PhantomPinned};
use core::mem::MaybeUninit;
use core::pin::Pin;
use core::ptr::NonNull;

use crate::block::{BlockSlot, FreeList, block_size, slot_to_value, value_to_slot};
use crate::contract::{Contract, DebugChecked, verify_object_count, verify_with};
use crate::error::{PoolError, PoolResult};
use crate::stats::PoolStats;
use crate::traits::{AllocatorTraits, BlockAllocator};

/// Pool of `CAPACITY` blocks stored inline
///
/// Allocation pops the free list first, then bumps through the buffer.
/// Running out of blocks is always reported as
/// [`PoolError::CapacityExceeded`], whatever the contract policy.
///
/// Not `Clone`, not swappable, no `reserve`/`reset`: the storage lives and
/// dies with the pool.
pub struct FixedPoolAllocator<T, const CAPACITY: usize, C: Contract = DebugChecked> {
    storage: UnsafeCell<[MaybeUninit<BlockSlot<T>>; CAPACITY]>,
    /// Blocks handed out by bump allocation
    offset: usize,
    free: FreeList<T>,
    used_blocks: usize,
    _pinned: PhantomPinned,
    _contract: PhantomData<fn() -> C>,
}

impl<T, const CAPACITY: usize, C: Contract> FixedPoolAllocator<T, CAPACITY, C> {
    /// Bytes per block
    pub const BLOCK_SIZE: usize = block_size::<T>();

    /// Creates an empty pool
    #[must_use]
    pub const fn new() -> Self {
        Self {
            storage: UnsafeCell::new([const { MaybeUninit::uninit() }; CAPACITY]),
            offset: 0,
            free: FreeList::new(),
            used_blocks: 0,
            _pinned: PhantomPinned,
            _contract: PhantomData,
        }
    }

    /// Total number of blocks
    pub const fn capacity(&self) -> usize {
        CAPACITY
    }

    /// Blocks currently handed out
    pub fn used_blocks(&self) -> usize {
        self.used_blocks
    }

    /// Blocks that can still be allocated
    pub fn remaining(&self) -> usize {
        CAPACITY - self.used_blocks
    }

    /// Checks if `ptr` is a bump-allocated block of this pool
    ///
    /// The address must lie inside the part of the buffer handed out so far
    /// and sit on a block boundary.
    pub fn contains(&self, ptr: NonNull<T>) -> bool {
        let start = self.storage.get() as usize;
        let end = start + self.offset * Self::BLOCK_SIZE;
        let addr = ptr.as_ptr() as usize;
        (start..end).contains(&addr) && (addr - start).is_multiple_of(Self::BLOCK_SIZE)
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            block_size: Self::BLOCK_SIZE,
            used_blocks: self.used_blocks,
            allocated_blocks: CAPACITY,
            free_blocks: self.free.len(),
            pages: 1,
            reserved_blocks: 0,
        }
    }

    fn block(&self, index: usize) -> NonNull<BlockSlot<T>> {
        debug_assert!(index < CAPACITY);
        let base = self.storage.get().cast::<BlockSlot<T>>();
        // SAFETY: index < CAPACITY keeps the pointer inside the buffer, and a
        // pointer derived from UnsafeCell::get is never null
        unsafe { NonNull::new_unchecked(base.add(index)) }
    }
}

impl<T, const CAPACITY: usize, C: Contract> Default for FixedPoolAllocator<T, CAPACITY, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const CAPACITY: usize, C: Contract> fmt::Debug for FixedPoolAllocator<T, CAPACITY, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedPoolAllocator")
            .field("capacity", &CAPACITY)
            .field("block_size", &Self::BLOCK_SIZE)
            .field("offset", &self.offset)
            .field("used_blocks", &self.used_blocks)
            .field("free_list", &self.free)
            .finish()
    }
}

// SAFETY: the buffer and every free-list node belong to this instance alone;
// moving the whole pool to another thread moves them together. Blocks may
// carry T values, hence T: Send.
unsafe impl<T: Send, const CAPACITY: usize, C: Contract> Send
    for FixedPoolAllocator<T, CAPACITY, C>
{
}

impl<T, const CAPACITY: usize, C: Contract> BlockAllocator
    for Pin<&mut FixedPoolAllocator<T, CAPACITY, C>>
{
    type Value = T;

    const TRAITS: AllocatorTraits = AllocatorTraits {
        is_always_equal: false,
        propagate_on_container_copy: false,
        propagate_on_container_move: false,
        propagate_on_container_swap: false,
        supports_multiple_objects: false,
        supports_reserve: false,
        supports_reset: false,
    };

    fn allocate(&mut self, count: usize) -> PoolResult<NonNull<T>> {
        verify_object_count::<C>(count)?;

        // SAFETY: the pool is never moved out of the pinned reference
        let pool = unsafe { self.as_mut().get_unchecked_mut() };
        let slot = match pool.free.pop() {
            Some(slot) => slot,
            None if pool.offset < CAPACITY => {
                let slot = pool.block(pool.offset);
                pool.offset += 1;
                slot
            }
            None => return Err(PoolError::capacity_exceeded(CAPACITY)),
        };

        pool.used_blocks += 1;
        Ok(slot_to_value(slot))
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<T>, count: usize) -> PoolResult<()> {
        verify_object_count::<C>(count)?;
        let slot = value_to_slot(ptr);
        verify_with::<C>(
            || self.used_blocks > 0 && self.contains(ptr) && !self.free.contains(slot),
            || PoolError::foreign_pointer(ptr.as_ptr()),
        )?;

        // SAFETY: the pool is never moved out of the pinned reference
        let pool = unsafe { self.as_mut().get_unchecked_mut() };
        if pool.offset > 0 && slot == pool.block(pool.offset - 1) {
            pool.offset -= 1;
        } else {
            // SAFETY: the block is inside this pool's buffer and no longer
            // live (caller contract)
            unsafe { pool.free.push(slot) };
        }

        pool.used_blocks -= 1;
        Ok(())
    }
}
